//! Read-only reference data: the drug catalog, pairwise interaction facts
//! and the drug-class rule tables the evaluators consult.

pub mod catalog;
pub mod interactions;
pub mod matching;
pub mod reference;

pub use catalog::*;
pub use interactions::*;
pub use reference::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Reference data load failed ({0}): {1}")]
    ReferenceDataLoad(String, String),

    #[error("Reference data parse failed ({0}): {1}")]
    ReferenceDataParse(String, String),

    #[error("Invalid drug record: {0}")]
    InvalidDrug(String),

    #[error("Duplicate drug id: {0}")]
    DuplicateDrug(String),

    #[error("Name '{name}' is claimed by both {first} and {second}")]
    AliasCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Duplicate interaction for pair ({drug_a}, {drug_b})")]
    DuplicateInteraction { drug_a: String, drug_b: String },

    #[error("Drug cannot interact with itself: {0}")]
    SelfInteraction(String),

    #[error("Unknown drug id '{id}' referenced in {context}")]
    UnknownDrug { id: String, context: String },
}
