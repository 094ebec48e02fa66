use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::knowledge::{InteractionFact, KnowledgeError, UnresolvedDrugReference};
use crate::models::{AlertCategory, AlertSeverity, Drug, FindingKind};

use super::policy::PolicyError;

/// Namespace for deterministic alert ids.
const ALERT_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_4c2e_9a7d_5e30_b8c1_2f4d_7a9e_0c13);

// ---------------------------------------------------------------------------
// OverrideState
// ---------------------------------------------------------------------------

/// Alerts start `Active` and may move to `Overridden` exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OverrideState {
    #[default]
    Active,
    Overridden { justification: Option<String> },
}

impl OverrideState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn justification(&self) -> Option<&str> {
        match self {
            Self::Active => None,
            Self::Overridden { justification } => justification.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// ClinicalAlert
// ---------------------------------------------------------------------------

/// A finding emitted by the interaction lookup or one rule evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalAlert {
    pub id: Uuid,
    /// Stable rule code, e.g. `safety.renal`.
    pub rule: String,
    /// Name of the evaluator that produced the alert.
    pub source: String,
    pub kind: FindingKind,
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    /// `true` records a check that was performed and satisfied.
    pub passed: bool,
    pub message: String,
    pub evidence: Vec<String>,
    pub recommendations: Vec<String>,
    pub drug_ids: Vec<String>,
    pub is_overridable: bool,
    pub requires_justification: bool,
    pub override_state: OverrideState,
}

impl ClinicalAlert {
    /// Active and failing: the alerts that drive the verdict and the score.
    pub fn is_outstanding(&self) -> bool {
        !self.passed && self.override_state.is_active()
    }

    pub fn is_blocking(&self) -> bool {
        self.is_outstanding() && self.severity == AlertSeverity::Critical
    }
}

/// Builds a [`ClinicalAlert`] with a deterministic id.
///
/// The id hashes the rule code, the sorted drug ids and an optional
/// discriminator (allergy entry, organism, field name), so identical inputs
/// always produce identical ids.
#[derive(Clone)]
pub struct AlertBuilder {
    alert: ClinicalAlert,
    discriminator: Option<String>,
}

impl AlertBuilder {
    pub fn new(
        source: &str,
        rule: &str,
        category: AlertCategory,
        severity: AlertSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert: ClinicalAlert {
                id: Uuid::nil(),
                rule: rule.to_string(),
                source: source.to_string(),
                kind: FindingKind::Rule,
                category,
                severity,
                passed: false,
                message: message.into(),
                evidence: Vec::new(),
                recommendations: Vec::new(),
                drug_ids: Vec::new(),
                is_overridable: false,
                requires_justification: false,
                override_state: OverrideState::Active,
            },
            discriminator: None,
        }
    }

    pub fn kind(mut self, kind: FindingKind) -> Self {
        self.alert.kind = kind;
        self
    }

    pub fn drug(mut self, drug: &Drug) -> Self {
        self.alert.drug_ids.push(drug.id.clone());
        self
    }

    pub fn drug_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alert.drug_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn evidence(mut self, line: impl Into<String>) -> Self {
        self.alert.evidence.push(line.into());
        self
    }

    pub fn recommend(mut self, line: impl Into<String>) -> Self {
        self.alert.recommendations.push(line.into());
        self
    }

    /// Overridable by acknowledgement.
    pub fn overridable(mut self) -> Self {
        self.alert.is_overridable = true;
        self
    }

    /// Overridable only with a written justification.
    pub fn justified_override(mut self) -> Self {
        self.alert.is_overridable = true;
        self.alert.requires_justification = true;
        self
    }

    pub fn passed(mut self) -> Self {
        self.alert.passed = true;
        self
    }

    pub fn discriminator(mut self, key: impl Into<String>) -> Self {
        self.discriminator = Some(key.into());
        self
    }

    pub fn build(mut self) -> ClinicalAlert {
        self.alert.drug_ids.sort();
        self.alert.drug_ids.dedup();

        let mut key = format!("{}|{}", self.alert.rule, self.alert.drug_ids.join(","));
        if let Some(d) = &self.discriminator {
            key.push('|');
            key.push_str(&d.to_lowercase());
        }
        self.alert.id = Uuid::new_v5(&ALERT_NAMESPACE, key.as_bytes());
        self.alert
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A context field that was missing where a rule needed it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataQualityWarning {
    pub field: String,
    pub message: String,
}

/// Tallies of active failing alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub critical: usize,
    pub high: usize,
    pub moderate: usize,
    pub low: usize,
    pub safety: usize,
    pub efficacy: usize,
    pub dosing: usize,
    pub monitoring: usize,
    pub overridden: usize,
    pub passed: usize,
}

impl AlertCounts {
    pub fn tally(alerts: &[ClinicalAlert]) -> Self {
        let mut counts = Self::default();
        for alert in alerts {
            if alert.passed {
                counts.passed += 1;
                continue;
            }
            if !alert.override_state.is_active() {
                counts.overridden += 1;
                continue;
            }
            match alert.severity {
                AlertSeverity::Critical => counts.critical += 1,
                AlertSeverity::High => counts.high += 1,
                AlertSeverity::Moderate => counts.moderate += 1,
                AlertSeverity::Low => counts.low += 1,
            }
            match alert.category {
                AlertCategory::Safety => counts.safety += 1,
                AlertCategory::Efficacy => counts.efficacy += 1,
                AlertCategory::Dosing => counts.dosing += 1,
                AlertCategory::Monitoring => counts.monitoring += 1,
            }
        }
        counts
    }

    /// Number of active failing alerts.
    pub fn total(&self) -> usize {
        self.critical + self.high + self.moderate + self.low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Resolved drugs, sorted by id.
    pub drugs: Vec<Drug>,
    /// Matched interaction facts, sorted by pair.
    pub interactions: Vec<InteractionFact>,
    pub pairs_checked: usize,
    /// All alerts, sorted by severity (highest first), category, rule, id.
    pub alerts: Vec<ClinicalAlert>,
    pub is_valid: bool,
    pub confidence_score: u32,
    pub blocking_issues: Vec<ClinicalAlert>,
    pub requires_review: bool,
    pub counts: AlertCounts,
    pub warnings: Vec<DataQualityWarning>,
}

impl ValidationReport {
    pub fn alert(&self, id: &Uuid) -> Option<&ClinicalAlert> {
        self.alerts.iter().find(|a| a.id == *id)
    }

    pub fn alerts_for_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a ClinicalAlert> {
        self.alerts.iter().filter(move |a| a.rule == rule)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    #[error("Evaluator {evaluator} failed: {message}")]
    Failed { evaluator: String, message: String },

    #[error("Evaluator {evaluator} panicked")]
    Panicked { evaluator: String },
}

/// Why an override request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideRejection {
    NotOverridable,
    AlreadyOverridden,
    JustificationRequired,
}

impl OverrideRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotOverridable => "alert is not overridable",
            Self::AlreadyOverridden => "alert is already overridden",
            Self::JustificationRequired => "a written justification is required",
        }
    }
}

impl std::fmt::Display for OverrideRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Override not permitted for alert {alert_id}: {reason}")]
pub struct OverrideNotPermitted {
    pub alert_id: Uuid,
    pub reason: OverrideRejection,
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    UnresolvedDrug(#[from] UnresolvedDrugReference),

    #[error(transparent)]
    OverrideNotPermitted(#[from] OverrideNotPermitted),

    #[error("Alert not found: {0}")]
    AlertNotFound(Uuid),

    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),
}
