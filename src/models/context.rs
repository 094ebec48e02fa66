use serde::{Deserialize, Serialize};

use super::enums::{HepaticStatus, InfectionSeverity};

/// Patient attributes consumed by the rule evaluators.
///
/// Every field is optional. A missing value means "not recorded", which the
/// evaluators treat as "cannot rule out risk", never as "no risk".
/// `allergies: Some(vec![])` records "no known allergies"; `None` means the
/// allergy history was never taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalContext {
    pub age: Option<u32>,
    pub weight_kg: Option<f64>,
    /// eGFR in mL/min/1.73m².
    #[serde(alias = "egfr")]
    pub renal_function: Option<f64>,
    pub hepatic_status: Option<HepaticStatus>,
    pub pregnancy: Option<bool>,
    pub allergies: Option<Vec<String>>,
    pub comorbidities: Vec<String>,
    pub infection_severity: Option<InfectionSeverity>,
    /// Organism names from culture reports.
    pub culture_results: Vec<String>,
}

impl ClinicalContext {
    /// Allergy entries with blanks removed.
    pub fn recorded_allergies(&self) -> Vec<&str> {
        self.allergies
            .iter()
            .flatten()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// Culture organisms with blanks removed.
    pub fn reported_organisms(&self) -> Vec<&str> {
        self.culture_results
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .collect()
    }
}
