//! Override workflow: `Active -> Overridden`, never back, never deleted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::aggregate::{build_report, ReportBasis};
use super::audit::AuditEntry;
use super::policy::ScoreWeights;
use super::types::{
    ClinicalAlert, OverrideNotPermitted, OverrideRejection, OverrideState, ValidationError,
    ValidationReport,
};

/// Check the transition preconditions and return the justification to store.
///
/// A justification that is blank after trimming counts as absent. When
/// present it is stored verbatim.
pub fn check_override(
    alert: &ClinicalAlert,
    justification: Option<&str>,
) -> Result<Option<String>, OverrideNotPermitted> {
    let reject = |reason| OverrideNotPermitted {
        alert_id: alert.id,
        reason,
    };

    if !alert.is_overridable {
        return Err(reject(OverrideRejection::NotOverridable));
    }
    if !alert.override_state.is_active() {
        return Err(reject(OverrideRejection::AlreadyOverridden));
    }

    let justification = justification
        .filter(|j| !j.trim().is_empty())
        .map(str::to_string);
    if alert.requires_justification && justification.is_none() {
        return Err(reject(OverrideRejection::JustificationRequired));
    }
    Ok(justification)
}

/// Override one alert and re-aggregate. The input report is never modified.
pub fn override_alert(
    report: &ValidationReport,
    alert_id: &Uuid,
    justification: Option<&str>,
    weights: &ScoreWeights,
) -> Result<ValidationReport, ValidationError> {
    let alert = report
        .alert(alert_id)
        .ok_or(ValidationError::AlertNotFound(*alert_id))?;

    let stored = check_override(alert, justification).inspect_err(|e| {
        tracing::warn!(
            alert_id = %alert_id,
            rule = %alert.rule,
            reason = %e.reason,
            "Override rejected"
        );
    })?;

    let mut alerts = report.alerts.clone();
    if let Some(target) = alerts.iter_mut().find(|a| a.id == *alert_id) {
        target.override_state = OverrideState::Overridden {
            justification: stored,
        };
    }

    let updated = build_report(ReportBasis::from(report), alerts, weights);

    tracing::info!(
        alert_id = %alert_id,
        rule = %alert.rule,
        severity = alert.severity.as_str(),
        is_valid = updated.is_valid,
        confidence = updated.confidence_score,
        "Alert overridden"
    );

    Ok(updated)
}

// ---------------------------------------------------------------------------
// OverrideSession
// ---------------------------------------------------------------------------

/// One clinician session over a report: applies overrides in sequence and
/// keeps the audit trail until the report is finalized.
pub struct OverrideSession {
    report: ValidationReport,
    weights: ScoreWeights,
    knowledge_fingerprint: String,
    audit: Vec<AuditEntry>,
}

impl OverrideSession {
    pub fn new(
        report: ValidationReport,
        weights: ScoreWeights,
        knowledge_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            report,
            weights,
            knowledge_fingerprint: knowledge_fingerprint.into(),
            audit: Vec::new(),
        }
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn audit_trail(&self) -> &[AuditEntry] {
        &self.audit
    }

    /// Apply an override on behalf of `actor`. On failure the session is
    /// unchanged.
    pub fn apply(
        &mut self,
        alert_id: &Uuid,
        justification: Option<&str>,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<&ValidationReport, ValidationError> {
        let updated = override_alert(&self.report, alert_id, justification, &self.weights)?;

        if let Some(alert) = updated.alert(alert_id) {
            self.audit.push(AuditEntry::record(
                alert,
                actor,
                at,
                &self.knowledge_fingerprint,
            ));
        }
        self.report = updated;
        Ok(&self.report)
    }

    /// Final report and the audit entries accumulated in this session.
    pub fn finish(self) -> (ValidationReport, Vec<AuditEntry>) {
        (self.report, self.audit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertCategory, AlertSeverity};
    use crate::validation::types::AlertBuilder;
    use chrono::TimeZone;

    fn critical_justified() -> ClinicalAlert {
        AlertBuilder::new(
            "safety",
            "safety.allergy",
            AlertCategory::Safety,
            AlertSeverity::Critical,
            "allergy",
        )
        .drug_ids(["amoxicillin"])
        .justified_override()
        .build()
    }

    fn renal_critical() -> ClinicalAlert {
        AlertBuilder::new(
            "safety",
            "safety.renal",
            AlertCategory::Safety,
            AlertSeverity::Critical,
            "renal",
        )
        .drug_ids(["gentamicin"])
        .build()
    }

    fn moderate_ack() -> ClinicalAlert {
        AlertBuilder::new(
            "dosing",
            "dosing.weight",
            AlertCategory::Dosing,
            AlertSeverity::Moderate,
            "weight",
        )
        .overridable()
        .build()
    }

    fn report(alerts: Vec<ClinicalAlert>) -> ValidationReport {
        build_report(ReportBasis::default(), alerts, &ScoreWeights::default())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn not_overridable_rejected_and_report_unchanged() {
        let alert = renal_critical();
        let original = report(vec![alert.clone()]);
        let snapshot = original.clone();

        let err = override_alert(&original, &alert.id, Some("reason"), &ScoreWeights::default())
            .unwrap_err();
        match err {
            ValidationError::OverrideNotPermitted(e) => {
                assert_eq!(e.reason, OverrideRejection::NotOverridable);
                assert_eq!(e.alert_id, alert.id);
            }
            other => panic!("Expected OverrideNotPermitted, got: {:?}", other),
        }
        assert_eq!(original, snapshot);
    }

    #[test]
    fn blank_justification_rejected_when_required() {
        let alert = critical_justified();
        let original = report(vec![alert.clone()]);
        for justification in [None, Some(""), Some("   ")] {
            let err = override_alert(&original, &alert.id, justification, &ScoreWeights::default())
                .unwrap_err();
            assert!(matches!(
                err,
                ValidationError::OverrideNotPermitted(OverrideNotPermitted {
                    reason: OverrideRejection::JustificationRequired,
                    ..
                })
            ));
        }
    }

    #[test]
    fn overriding_last_critical_restores_validity() {
        let alert = critical_justified();
        let original = report(vec![alert.clone(), moderate_ack()]);
        assert!(!original.is_valid);

        let updated = override_alert(
            &original,
            &alert.id,
            Some("  Tolerated amoxicillin last year "),
            &ScoreWeights::default(),
        )
        .unwrap();
        assert!(updated.is_valid);
        assert!(updated.blocking_issues.is_empty());
        assert_eq!(updated.confidence_score, 95);
        assert_eq!(
            updated.alert(&alert.id).unwrap().override_state,
            OverrideState::Overridden {
                justification: Some("  Tolerated amoxicillin last year ".into())
            }
        );
        assert_eq!(updated.alerts.len(), original.alerts.len());
        assert!(!original.is_valid);
    }

    #[test]
    fn overriding_non_critical_keeps_validity() {
        let ack = moderate_ack();
        let original = report(vec![critical_justified(), ack.clone()]);
        let updated = override_alert(&original, &ack.id, None, &ScoreWeights::default()).unwrap();
        assert_eq!(updated.is_valid, original.is_valid);
        assert_eq!(updated.alert(&ack.id).unwrap().override_state.justification(), None);
    }

    #[test]
    fn second_override_rejected() {
        let ack = moderate_ack();
        let once = override_alert(&report(vec![ack.clone()]), &ack.id, None, &ScoreWeights::default())
            .unwrap();
        let err = override_alert(&once, &ack.id, None, &ScoreWeights::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OverrideNotPermitted(OverrideNotPermitted {
                reason: OverrideRejection::AlreadyOverridden,
                ..
            })
        ));
    }

    #[test]
    fn unknown_alert_id() {
        let err = override_alert(&report(vec![]), &Uuid::nil(), None, &ScoreWeights::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::AlertNotFound(_)));
    }

    #[test]
    fn session_records_audit_trail() {
        let allergy = critical_justified();
        let ack = moderate_ack();
        let mut session = OverrideSession::new(
            report(vec![allergy.clone(), ack.clone()]),
            ScoreWeights::default(),
            "fingerprint",
        );

        session
            .apply(&allergy.id, Some("Graded challenge passed"), "dr.ames", now())
            .unwrap();
        assert!(session.apply(&allergy.id, Some("again"), "dr.ames", now()).is_err());
        session.apply(&ack.id, None, "rn.kim", now()).unwrap();

        let (final_report, trail) = session.finish();
        assert!(final_report.is_valid);
        assert_eq!(final_report.confidence_score, 100);
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].alert_id, allergy.id);
        assert_eq!(trail[0].justification.as_deref(), Some("Graded challenge passed"));
        assert_eq!(trail[1].actor, "rn.kim");
        assert_eq!(trail[1].knowledge_fingerprint, "fingerprint");
    }
}
