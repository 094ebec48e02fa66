use std::cmp::Reverse;
use std::collections::HashSet;

use crate::knowledge::InteractionFact;
use crate::models::{Drug, FindingKind};

use super::policy::ScoreWeights;
use super::types::{AlertCounts, ClinicalAlert, DataQualityWarning, ValidationReport};

/// Non-alert parts of a report, carried through re-aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportBasis {
    pub drugs: Vec<Drug>,
    pub interactions: Vec<InteractionFact>,
    pub pairs_checked: usize,
    pub warnings: Vec<DataQualityWarning>,
}

impl From<&ValidationReport> for ReportBasis {
    fn from(report: &ValidationReport) -> Self {
        Self {
            drugs: report.drugs.clone(),
            interactions: report.interactions.clone(),
            pairs_checked: report.pairs_checked,
            warnings: report.warnings.clone(),
        }
    }
}

/// Merge lookup and evaluator alerts into one report.
pub fn aggregate(
    basis: ReportBasis,
    interaction_alerts: Vec<ClinicalAlert>,
    evaluator_alerts: Vec<Vec<ClinicalAlert>>,
    weights: &ScoreWeights,
) -> ValidationReport {
    let alerts: Vec<ClinicalAlert> = interaction_alerts
        .into_iter()
        .chain(evaluator_alerts.into_iter().flatten())
        .collect();
    build_report(basis, alerts, weights)
}

/// Derive the verdict, score and tallies from the current alert states.
///
/// Only active failing alerts count. Alerts sharing an id are merged, keeping
/// the most severe copy. The result does not depend on the order of `alerts`.
pub fn build_report(
    basis: ReportBasis,
    mut alerts: Vec<ClinicalAlert>,
    weights: &ScoreWeights,
) -> ValidationReport {
    sort_alerts(&mut alerts);

    let before = alerts.len();
    let mut seen = HashSet::new();
    alerts.retain(|a| seen.insert(a.id));
    if alerts.len() < before {
        tracing::warn!(merged = before - alerts.len(), "Duplicate alert ids merged");
    }

    let mut warnings = basis.warnings;
    warnings.sort();
    warnings.dedup();

    let blocking_issues: Vec<ClinicalAlert> =
        alerts.iter().filter(|a| a.is_blocking()).cloned().collect();

    let requires_review = alerts.iter().any(|a| {
        a.is_outstanding() && (a.severity.needs_review() || a.kind == FindingKind::EvaluatorFailure)
    });

    let penalty: u32 = alerts
        .iter()
        .filter(|a| a.is_outstanding())
        .map(|a| weights.weight(a.severity))
        .sum();
    let confidence_score = 100u32.saturating_sub(penalty);

    let counts = AlertCounts::tally(&alerts);

    ValidationReport {
        drugs: basis.drugs,
        interactions: basis.interactions,
        pairs_checked: basis.pairs_checked,
        is_valid: blocking_issues.is_empty(),
        confidence_score,
        blocking_issues,
        requires_review,
        counts,
        warnings,
        alerts,
    }
}

/// Severity (highest first), then category, rule and id.
pub fn sort_alerts(alerts: &mut [ClinicalAlert]) {
    alerts.sort_by(|a, b| {
        (Reverse(a.severity), a.category, &a.rule, a.id)
            .cmp(&(Reverse(b.severity), b.category, &b.rule, b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertCategory, AlertSeverity};
    use crate::validation::types::{AlertBuilder, OverrideState};

    fn alert(rule: &str, category: AlertCategory, severity: AlertSeverity) -> ClinicalAlert {
        AlertBuilder::new("test", rule, category, severity, "test").build()
    }

    fn report(alerts: Vec<ClinicalAlert>) -> ValidationReport {
        build_report(ReportBasis::default(), alerts, &ScoreWeights::default())
    }

    #[test]
    fn empty_report_is_valid_and_perfect() {
        let r = report(vec![]);
        assert!(r.is_valid);
        assert!(!r.requires_review);
        assert_eq!(r.confidence_score, 100);
    }

    #[test]
    fn one_critical_one_moderate_scores_65() {
        let r = report(vec![
            alert("safety.pregnancy", AlertCategory::Safety, AlertSeverity::Critical),
            alert("dosing.weight", AlertCategory::Dosing, AlertSeverity::Moderate),
        ]);
        assert_eq!(r.confidence_score, 65);
        assert!(!r.is_valid);
        assert_eq!(r.blocking_issues.len(), 1);
        assert!(r.requires_review);
    }

    #[test]
    fn score_floors_at_zero() {
        let alerts = (0..5)
            .map(|i| alert(&format!("safety.r{i}"), AlertCategory::Safety, AlertSeverity::Critical))
            .collect();
        assert_eq!(report(alerts).confidence_score, 0);
    }

    #[test]
    fn passed_and_overridden_alerts_do_not_count() {
        let passed = AlertBuilder::new(
            "efficacy",
            "efficacy.culture",
            AlertCategory::Efficacy,
            AlertSeverity::Low,
            "covered",
        )
        .passed()
        .build();
        let mut overridden = alert("safety.allergy", AlertCategory::Safety, AlertSeverity::Critical);
        overridden.override_state = OverrideState::Overridden {
            justification: Some("tolerated previously".into()),
        };

        let r = report(vec![passed, overridden]);
        assert!(r.is_valid);
        assert!(!r.requires_review);
        assert_eq!(r.confidence_score, 100);
        assert_eq!(r.alerts.len(), 2);
    }

    #[test]
    fn moderate_only_needs_no_review() {
        let r = report(vec![alert("dosing.weight", AlertCategory::Dosing, AlertSeverity::Moderate)]);
        assert!(r.is_valid);
        assert!(!r.requires_review);
        assert_eq!(r.confidence_score, 95);
    }

    #[test]
    fn evaluator_failure_forces_review() {
        let failure = AlertBuilder::new(
            "efficacy",
            "evaluator.failure",
            AlertCategory::Efficacy,
            AlertSeverity::Low,
            "failed",
        )
        .kind(FindingKind::EvaluatorFailure)
        .build();
        let r = report(vec![failure]);
        assert!(r.requires_review);
        assert!(r.is_valid);
        assert_eq!(r.confidence_score, 98);
    }

    #[test]
    fn alerts_sorted_by_severity_then_category() {
        let r = report(vec![
            alert("dosing.weight", AlertCategory::Dosing, AlertSeverity::Moderate),
            alert("monitoring.levels", AlertCategory::Monitoring, AlertSeverity::High),
            alert("safety.renal", AlertCategory::Safety, AlertSeverity::High),
            alert("safety.allergy", AlertCategory::Safety, AlertSeverity::Critical),
        ]);
        let rules: Vec<&str> = r.alerts.iter().map(|a| a.rule.as_str()).collect();
        assert_eq!(
            rules,
            vec!["safety.allergy", "safety.renal", "monitoring.levels", "dosing.weight"]
        );
    }

    #[test]
    fn result_is_order_independent() {
        let a = alert("safety.renal", AlertCategory::Safety, AlertSeverity::High);
        let b = alert("dosing.weight", AlertCategory::Dosing, AlertSeverity::Moderate);
        let c = alert("safety.elderly", AlertCategory::Safety, AlertSeverity::Moderate);
        assert_eq!(
            report(vec![a.clone(), b.clone(), c.clone()]),
            report(vec![c, a, b])
        );
    }

    #[test]
    fn custom_weights_apply() {
        let weights = ScoreWeights {
            critical: 50,
            high: 20,
            moderate: 10,
            low: 1,
        };
        let r = build_report(
            ReportBasis::default(),
            vec![alert("safety.renal", AlertCategory::Safety, AlertSeverity::High)],
            &weights,
        );
        assert_eq!(r.confidence_score, 80);
    }

    #[test]
    fn duplicate_ids_are_merged_and_one_override_clears_them() {
        let allergy = AlertBuilder::new(
            "safety",
            "safety.allergy",
            AlertCategory::Safety,
            AlertSeverity::Critical,
            "allergy",
        )
        .drug_ids(["amoxicillin"])
        .justified_override()
        .discriminator("group:penicillin")
        .build();

        let r = report(vec![allergy.clone(), allergy.clone()]);
        assert_eq!(r.alerts.len(), 1);
        assert_eq!(r.blocking_issues.len(), 1);
        assert_eq!(r.confidence_score, 70);

        let cleared = crate::validation::overrides::override_alert(
            &r,
            &allergy.id,
            Some("Tolerated amoxicillin in 2024"),
            &ScoreWeights::default(),
        )
        .unwrap();
        assert!(cleared.is_valid);
        assert_eq!(cleared.confidence_score, 100);
    }
}
