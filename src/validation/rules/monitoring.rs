use crate::models::{AlertCategory, AlertSeverity};
use crate::validation::messages::MessageTemplates;
use crate::validation::types::{AlertBuilder, EvaluatorError};

use super::{drugs_in, Findings, RuleEvaluator, RuleInput};

const SOURCE: &str = "monitoring";

pub const RULE_LEVELS: &str = "monitoring.levels";

/// Narrow-therapeutic-index drugs need level monitoring. The finding stays
/// failing until a clinician acknowledges it through an override.
pub struct MonitoringEvaluator;

impl RuleEvaluator for MonitoringEvaluator {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Monitoring
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Result<Findings, EvaluatorError> {
        let mut findings = Findings::default();

        for drug in drugs_in(input.drugs, &input.rules.narrow_therapeutic_index) {
            findings.push(
                AlertBuilder::new(
                    SOURCE,
                    RULE_LEVELS,
                    AlertCategory::Monitoring,
                    AlertSeverity::High,
                    MessageTemplates::monitoring(&drug.canonical_name),
                )
                .drug(drug)
                .evidence(format!("{} ({}) has a narrow therapeutic index", drug.canonical_name, drug.class))
                .recommend("Obtain a baseline level or marker before the first dose.")
                .recommend("Schedule follow-up levels and adjust dosing to target.")
                .overridable()
                .build(),
            );
        }

        Ok(findings)
    }
}
