use crate::models::{AlertCategory, AlertSeverity};
use crate::validation::messages::MessageTemplates;
use crate::validation::types::{AlertBuilder, EvaluatorError};

use super::{usable_measurement, Findings, RuleEvaluator, RuleInput};

const SOURCE: &str = "dosing";

pub const RULE_WEIGHT: &str = "dosing.weight";
pub const RULE_PEDIATRIC: &str = "dosing.pediatric";
pub const RULE_DUPLICATE: &str = "dosing.duplicate";

/// Weight band, paediatric age and duplicate selections.
pub struct DosingEvaluator;

impl RuleEvaluator for DosingEvaluator {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Dosing
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Result<Findings, EvaluatorError> {
        let mut findings = Findings::default();
        if input.drugs.is_empty() {
            return Ok(findings);
        }

        let all_ids = || input.drugs.iter().map(|d| d.id.clone());
        let band = input.policy.weight_band_kg;

        let selection: Vec<_> = input.drugs.iter().collect();
        match input.context.weight_kg {
            Some(recorded) => match usable_measurement(recorded) {
                Some(weight) if !band.contains(weight) => {
                    findings.push(
                        AlertBuilder::new(
                            SOURCE,
                            RULE_WEIGHT,
                            AlertCategory::Dosing,
                            AlertSeverity::Moderate,
                            MessageTemplates::weight_out_of_band(weight, band.min, band.max),
                        )
                        .drug_ids(all_ids())
                        .evidence(format!("Weight: {:.1} kg", weight))
                        .recommend("Recalculate doses on a weight basis (actual, ideal or adjusted body weight).")
                        .overridable()
                        .build(),
                    );
                }
                Some(_) => {}
                None => findings.unusable(
                    SOURCE,
                    RULE_WEIGHT,
                    AlertCategory::Dosing,
                    AlertSeverity::Low,
                    "weight_kg",
                    recorded,
                    "a weight-based dosing error",
                    &selection,
                ),
            },
            None => {
                findings.missing_once(
                    SOURCE,
                    RULE_WEIGHT,
                    AlertCategory::Dosing,
                    AlertSeverity::Low,
                    "weight_kg",
                    "a weight-based dosing error",
                    &selection,
                );
            }
        }

        if let Some(age) = input.context.age {
            if age < input.policy.pediatric_age {
                findings.push(
                    AlertBuilder::new(
                        SOURCE,
                        RULE_PEDIATRIC,
                        AlertCategory::Dosing,
                        AlertSeverity::Moderate,
                        MessageTemplates::pediatric(age),
                    )
                    .drug_ids(all_ids())
                    .evidence(format!("Age: {}", age))
                    .recommend("Use paediatric mg/kg dosing references.")
                    .overridable()
                    .build(),
                );
            }
        }

        for duplicate in input.duplicates {
            let name = input
                .drugs
                .iter()
                .find(|d| d.id == duplicate.drug_id)
                .map(|d| d.canonical_name.as_str())
                .unwrap_or(duplicate.drug_id.as_str());
            findings.push(
                AlertBuilder::new(
                    SOURCE,
                    RULE_DUPLICATE,
                    AlertCategory::Dosing,
                    AlertSeverity::Moderate,
                    MessageTemplates::duplicate_selection(name, &duplicate.references),
                )
                .drug_ids([duplicate.drug_id.clone()])
                .evidence(format!("References: {}", duplicate.references.join(", ")))
                .recommend("Remove the duplicate entry so the drug is dosed once.")
                .overridable()
                .build(),
            );
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClinicalContext, FindingKind};
    use crate::validation::rules::fixtures::{complete_context, run};

    #[test]
    fn weight_in_band_is_clean() {
        let findings = run(&DosingEvaluator, &["ceftriaxone"], &complete_context());
        assert!(findings.alerts.is_empty());
    }

    #[test]
    fn low_weight_is_moderate() {
        let ctx = ClinicalContext {
            weight_kg: Some(45.0),
            ..complete_context()
        };
        let findings = run(&DosingEvaluator, &["ceftriaxone"], &ctx);
        assert_eq!(findings.alerts.len(), 1);
        assert_eq!(findings.alerts[0].rule, RULE_WEIGHT);
        assert_eq!(findings.alerts[0].severity, AlertSeverity::Moderate);
        assert!(findings.alerts[0].recommendations[0].contains("weight basis"));
    }

    #[test]
    fn high_weight_is_moderate() {
        let ctx = ClinicalContext {
            weight_kg: Some(140.0),
            ..complete_context()
        };
        let findings = run(&DosingEvaluator, &["vancomycin"], &ctx);
        assert_eq!(findings.alerts[0].severity, AlertSeverity::Moderate);
    }

    #[test]
    fn missing_weight_is_low_insufficient_data() {
        let ctx = ClinicalContext {
            weight_kg: None,
            ..complete_context()
        };
        let findings = run(&DosingEvaluator, &["ceftriaxone"], &ctx);
        assert_eq!(findings.alerts.len(), 1);
        assert_eq!(findings.alerts[0].kind, FindingKind::InsufficientData);
        assert_eq!(findings.alerts[0].severity, AlertSeverity::Low);
        assert_eq!(findings.warnings[0].field, "weight_kg");
    }

    #[test]
    fn child_gets_pediatric_reminder() {
        let ctx = ClinicalContext {
            age: Some(9),
            weight_kg: Some(30.0),
            ..complete_context()
        };
        let findings = run(&DosingEvaluator, &["amoxicillin"], &ctx);
        assert!(findings.alerts.iter().any(|a| a.rule == RULE_PEDIATRIC));
        assert!(findings.alerts.iter().any(|a| a.rule == RULE_WEIGHT));
    }

    #[test]
    fn duplicate_selection_flagged() {
        let findings = run(
            &DosingEvaluator,
            &["Bactrim", "co-trimoxazole"],
            &complete_context(),
        );
        assert_eq!(findings.alerts.len(), 1);
        let alert = &findings.alerts[0];
        assert_eq!(alert.rule, RULE_DUPLICATE);
        assert_eq!(alert.drug_ids, vec!["trimethoprim-sulfamethoxazole"]);
        assert!(alert.message.contains("Bactrim"));
    }

    #[test]
    fn negative_weight_is_insufficient_data() {
        let ctx = ClinicalContext {
            weight_kg: Some(-1.0),
            age: Some(9),
            ..complete_context()
        };
        let findings = run(&DosingEvaluator, &["amoxicillin"], &ctx);

        let weight: Vec<_> = findings.alerts.iter().filter(|a| a.rule == RULE_WEIGHT).collect();
        assert_eq!(weight.len(), 1);
        assert_eq!(weight[0].kind, FindingKind::InsufficientData);
        assert!(findings.alerts.iter().any(|a| a.rule == RULE_PEDIATRIC));
        assert_eq!(findings.warnings[0].field, "weight_kg");
    }
}
