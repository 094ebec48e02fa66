pub mod config;
pub mod knowledge; // Drug catalog, interaction table, rule tables
pub mod models;
pub mod validation; // Lookup, evaluators, aggregation, overrides

pub use knowledge::{KnowledgeBase, UnresolvedDrugReference};
pub use models::ClinicalContext;
pub use validation::{
    OverrideNotPermitted, ValidationEngine, ValidationError, ValidationReport,
};
