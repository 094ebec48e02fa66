use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use uuid::Uuid;

use crate::knowledge::{InteractionFact, KnowledgeBase};
use crate::models::{AlertSeverity, ClinicalContext, FindingKind};

use super::aggregate::{aggregate, ReportBasis};
use super::lookup::{find_interactions, interaction_alerts};
use super::messages::MessageTemplates;
use super::overrides::{self, OverrideSession};
use super::policy::{ExecutionMode, ValidationPolicy};
use super::rules::{default_evaluators, Findings, RuleEvaluator, RuleInput};
use super::types::{AlertBuilder, ClinicalAlert, EvaluatorError, ValidationError, ValidationReport};

/// Entry point: interaction checks, full validation and overrides.
pub struct ValidationEngine {
    knowledge: KnowledgeBase,
    policy: ValidationPolicy,
    evaluators: Vec<Box<dyn RuleEvaluator>>,
}

impl ValidationEngine {
    pub fn new(knowledge: KnowledgeBase, policy: ValidationPolicy) -> Self {
        Self::with_evaluators(knowledge, policy, default_evaluators())
    }

    pub fn with_evaluators(
        knowledge: KnowledgeBase,
        policy: ValidationPolicy,
        evaluators: Vec<Box<dyn RuleEvaluator>>,
    ) -> Self {
        Self {
            knowledge,
            policy,
            evaluators,
        }
    }

    /// Bundled dataset with the default policy.
    pub fn builtin() -> Result<Self, ValidationError> {
        Ok(Self::new(KnowledgeBase::builtin()?, ValidationPolicy::default()))
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Interactions among the referenced drugs, sorted by pair.
    pub fn check_interactions<S: AsRef<str>>(
        &self,
        references: &[S],
    ) -> Result<Vec<InteractionFact>, ValidationError> {
        let selection = self.knowledge.catalog.resolve_all(references)?;
        let check = find_interactions(&selection.drugs, &self.knowledge.interactions);
        Ok(check.interactions().into_iter().cloned().collect())
    }

    /// Resolve the drugs, run the lookup and every evaluator, aggregate.
    pub fn validate<S: AsRef<str>>(
        &self,
        references: &[S],
        context: &ClinicalContext,
    ) -> Result<ValidationReport, ValidationError> {
        let start = Instant::now();

        let selection = self.knowledge.catalog.resolve_all(references)?;
        let check = find_interactions(&selection.drugs, &self.knowledge.interactions);
        let lookup_alerts = interaction_alerts(&check, &selection.drugs);

        let input = RuleInput {
            drugs: &selection.drugs,
            duplicates: &selection.duplicates,
            context,
            rules: &self.knowledge.rules,
            policy: &self.policy,
        };

        let mut warnings = Vec::new();
        let mut evaluator_alerts = Vec::with_capacity(self.evaluators.len());
        for (evaluator, outcome) in self.evaluators.iter().zip(self.run_evaluators(&input)) {
            match outcome {
                Ok(findings) => {
                    tracing::debug!(
                        evaluator = evaluator.name(),
                        alerts = findings.alerts.len(),
                        warnings = findings.warnings.len(),
                        "Evaluator complete"
                    );
                    warnings.extend(findings.warnings);
                    evaluator_alerts.push(findings.alerts);
                }
                Err(e) => {
                    tracing::warn!(evaluator = evaluator.name(), error = %e, "Evaluator failed");
                    evaluator_alerts.push(vec![failure_alert(evaluator.as_ref(), &e)]);
                }
            }
        }

        let basis = ReportBasis {
            drugs: selection.drugs.clone(),
            interactions: check.interactions().into_iter().cloned().collect(),
            pairs_checked: check.pairs_checked(),
            warnings,
        };
        let report = aggregate(
            basis,
            lookup_alerts,
            evaluator_alerts,
            &self.policy.score_weights,
        );

        tracing::info!(
            drugs = report.drugs.len(),
            pairs = report.pairs_checked,
            alerts = report.counts.total(),
            blocking = report.blocking_issues.len(),
            confidence = report.confidence_score,
            is_valid = report.is_valid,
            requires_review = report.requires_review,
            processing_ms = start.elapsed().as_millis() as u64,
            "Validation complete"
        );

        Ok(report)
    }

    /// Override one alert. Returns a new, re-aggregated report; the input
    /// report is untouched whether or not the override is accepted.
    pub fn override_alert(
        &self,
        report: &ValidationReport,
        alert_id: &Uuid,
        justification: Option<&str>,
    ) -> Result<ValidationReport, ValidationError> {
        overrides::override_alert(report, alert_id, justification, &self.policy.score_weights)
    }

    /// Start an audited override session over a report.
    pub fn start_session(&self, report: ValidationReport) -> OverrideSession {
        OverrideSession::new(
            report,
            self.policy.score_weights,
            self.knowledge.fingerprint(),
        )
    }

    /// Run every evaluator, isolating errors and panics. Results keep the
    /// evaluator order in both execution modes.
    fn run_evaluators(&self, input: &RuleInput<'_>) -> Vec<Result<Findings, EvaluatorError>> {
        match self.policy.execution_mode {
            ExecutionMode::Sequential => self
                .evaluators
                .iter()
                .map(|evaluator| run_isolated(evaluator.as_ref(), input))
                .collect(),
            ExecutionMode::Parallel => std::thread::scope(|scope| {
                let handles: Vec<_> = self
                    .evaluators
                    .iter()
                    .map(|evaluator| {
                        let evaluator = evaluator.as_ref();
                        let handle = scope.spawn(move || run_isolated(evaluator, input));
                        (evaluator.name(), handle)
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|(name, handle)| {
                        handle.join().unwrap_or_else(|_| {
                            Err(EvaluatorError::Panicked {
                                evaluator: name.to_string(),
                            })
                        })
                    })
                    .collect()
            }),
        }
    }
}

fn run_isolated(
    evaluator: &dyn RuleEvaluator,
    input: &RuleInput<'_>,
) -> Result<Findings, EvaluatorError> {
    catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(input))).unwrap_or_else(|_| {
        Err(EvaluatorError::Panicked {
            evaluator: evaluator.name().to_string(),
        })
    })
}

/// Low-severity stand-in for an evaluator that produced no result.
fn failure_alert(evaluator: &dyn RuleEvaluator, error: &EvaluatorError) -> ClinicalAlert {
    AlertBuilder::new(
        evaluator.name(),
        &format!("{}.evaluator_failure", evaluator.name()),
        evaluator.category(),
        AlertSeverity::Low,
        MessageTemplates::evaluator_failure(evaluator.name()),
    )
    .kind(FindingKind::EvaluatorFailure)
    .evidence(error.to_string())
    .recommend(format!(
        "Review {} rules manually before prescribing.",
        evaluator.category()
    ))
    .overridable()
    .build()
}
