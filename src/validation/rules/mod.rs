//! Rule category evaluators.
//!
//! Each evaluator is a pure function of the resolved drugs, the clinical
//! context, the rule tables and the policy. Evaluators never share state, so
//! the engine may run them in any order or concurrently.

pub mod dosing;
pub mod efficacy;
pub mod monitoring;
pub mod safety;

use crate::knowledge::{ClinicalRuleSet, DuplicateSelection};
use crate::models::{AlertCategory, AlertSeverity, ClinicalContext, Drug, FindingKind};

use super::messages::MessageTemplates;
use super::policy::ValidationPolicy;
use super::types::{AlertBuilder, ClinicalAlert, DataQualityWarning, EvaluatorError};

pub use dosing::DosingEvaluator;
pub use efficacy::EfficacyEvaluator;
pub use monitoring::MonitoringEvaluator;
pub use safety::SafetyEvaluator;

/// Everything an evaluator may read.
#[derive(Clone, Copy)]
pub struct RuleInput<'a> {
    /// Resolved drugs, sorted by id, without duplicates.
    pub drugs: &'a [Drug],
    pub duplicates: &'a [DuplicateSelection],
    pub context: &'a ClinicalContext,
    pub rules: &'a ClinicalRuleSet,
    pub policy: &'a ValidationPolicy,
}

/// Alerts plus data-quality warnings from one evaluator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    pub alerts: Vec<ClinicalAlert>,
    pub warnings: Vec<DataQualityWarning>,
}

impl Findings {
    pub fn push(&mut self, alert: ClinicalAlert) {
        self.alerts.push(alert);
    }

    /// Record that `field` was missing where `rule` needed it: one
    /// insufficient-data alert per affected drug (one drug-less alert when
    /// `drugs` is empty) and one warning for the field.
    ///
    /// These alerts are overridable by acknowledgement.
    #[allow(clippy::too_many_arguments)]
    pub fn missing(
        &mut self,
        source: &str,
        rule: &str,
        category: AlertCategory,
        severity: AlertSeverity,
        field: &str,
        concern: &str,
        drugs: &[&Drug],
    ) {
        let base = self.missing_base(source, rule, category, severity, field, concern);
        if drugs.is_empty() {
            self.push(base.build());
            return;
        }
        for drug in drugs {
            let alert = base.clone().drug(drug).build();
            self.push(alert);
        }
    }

    /// Like [`Findings::missing`], but a single alert covering all `drugs`.
    #[allow(clippy::too_many_arguments)]
    pub fn missing_once(
        &mut self,
        source: &str,
        rule: &str,
        category: AlertCategory,
        severity: AlertSeverity,
        field: &str,
        concern: &str,
        drugs: &[&Drug],
    ) {
        let base = self.missing_base(source, rule, category, severity, field, concern);
        let alert = base
            .drug_ids(drugs.iter().map(|d| d.id.clone()))
            .build();
        self.push(alert);
    }

    /// Record that `field` held a value no rule can use (NaN, infinite or
    /// negative). Treated like a missing value: one insufficient-data alert
    /// covering `drugs` plus a warning. The other rules are unaffected.
    #[allow(clippy::too_many_arguments)]
    pub fn unusable(
        &mut self,
        source: &str,
        rule: &str,
        category: AlertCategory,
        severity: AlertSeverity,
        field: &str,
        value: f64,
        concern: &str,
        drugs: &[&Drug],
    ) {
        let message = MessageTemplates::unusable_measurement(field, value, concern);
        let alert = self
            .insufficient(source, rule, category, severity, field, message, "invalid")
            .evidence(format!("Unusable context field: {} = {}", field, value))
            .drug_ids(drugs.iter().map(|d| d.id.clone()))
            .build();
        self.push(alert);
    }

    fn missing_base(
        &mut self,
        source: &str,
        rule: &str,
        category: AlertCategory,
        severity: AlertSeverity,
        field: &str,
        concern: &str,
    ) -> AlertBuilder {
        let message = MessageTemplates::insufficient_data(field, concern);
        self.insufficient(source, rule, category, severity, field, message, "missing")
            .evidence(format!("Missing context field: {}", field))
    }

    #[allow(clippy::too_many_arguments)]
    fn insufficient(
        &mut self,
        source: &str,
        rule: &str,
        category: AlertCategory,
        severity: AlertSeverity,
        field: &str,
        message: String,
        discriminator: &str,
    ) -> AlertBuilder {
        let warning = DataQualityWarning {
            field: field.to_string(),
            message: message.clone(),
        };
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }

        AlertBuilder::new(source, rule, category, severity, message)
            .kind(FindingKind::InsufficientData)
            .recommend(format!("Record {} and re-run validation.", field))
            .overridable()
            .discriminator(format!("{}:{}", discriminator, field))
    }
}

/// One rule category.
pub trait RuleEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    fn category(&self) -> AlertCategory;

    fn evaluate(&self, input: &RuleInput<'_>) -> Result<Findings, EvaluatorError>;
}

/// The four standard evaluators, in a fixed order.
pub fn default_evaluators() -> Vec<Box<dyn RuleEvaluator>> {
    vec![
        Box::new(SafetyEvaluator),
        Box::new(EfficacyEvaluator),
        Box::new(DosingEvaluator),
        Box::new(MonitoringEvaluator),
    ]
}

/// Drugs from the selection that belong to a rule set.
pub(crate) fn drugs_in<'a>(
    drugs: &'a [Drug],
    set: &crate::knowledge::DrugSet,
) -> Vec<&'a Drug> {
    drugs.iter().filter(|d| set.contains(d)).collect()
}

/// A measurement the rules can use: finite and not negative.
pub(crate) fn usable_measurement(value: f64) -> Option<f64> {
    (value.is_finite() && value >= 0.0).then_some(value)
}
