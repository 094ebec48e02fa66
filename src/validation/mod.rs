//! Clinical validation: interaction lookup, the four rule evaluators,
//! report aggregation and the override workflow.

pub mod aggregate;
pub mod audit;
pub mod engine;
pub mod lookup;
pub mod messages;
pub mod overrides;
pub mod policy;
pub mod rules;
pub mod types;

pub use audit::AuditEntry;
pub use engine::ValidationEngine;
pub use overrides::OverrideSession;
pub use policy::{ExecutionMode, ValidationPolicy};
pub use rules::{Findings, RuleEvaluator, RuleInput};
pub use types::*;
