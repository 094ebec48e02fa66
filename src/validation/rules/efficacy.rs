use std::collections::HashSet;

use crate::knowledge::matching::normalize_term;
use crate::models::{AlertCategory, AlertSeverity, Drug, InfectionSeverity};
use crate::validation::messages::MessageTemplates;
use crate::validation::types::{AlertBuilder, EvaluatorError};

use super::{drugs_in, Findings, RuleEvaluator, RuleInput};

const SOURCE: &str = "efficacy";

pub const RULE_CULTURE: &str = "efficacy.culture";
pub const RULE_BREADTH: &str = "efficacy.breadth";

/// Culture-directed coverage and severity-appropriate breadth.
pub struct EfficacyEvaluator;

impl RuleEvaluator for EfficacyEvaluator {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Efficacy
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Result<Findings, EvaluatorError> {
        let mut findings = Findings::default();
        check_culture_coverage(input, &mut findings);
        check_breadth(input, &mut findings);
        Ok(findings)
    }
}

// ---------------------------------------------------------------------------
// Culture-directed coverage
// ---------------------------------------------------------------------------

/// Coverage verdict for one reported organism.
struct OrganismResult<'a> {
    reported: &'a str,
    /// `None` when the organism is not in the coverage table.
    covering: Option<Vec<&'a Drug>>,
}

fn check_culture_coverage(input: &RuleInput<'_>, findings: &mut Findings) {
    let mut reported = input.context.reported_organisms();
    if reported.is_empty() {
        return;
    }
    let mut seen = HashSet::new();
    reported.retain(|organism| seen.insert(normalize_term(organism)));

    let results: Vec<OrganismResult> = reported
        .into_iter()
        .map(|organism| OrganismResult {
            reported: organism,
            covering: input
                .rules
                .identify_organism(organism)
                .map(|coverage| drugs_in(input.drugs, &coverage.covered_by)),
        })
        .collect();

    let evidence: Vec<String> = results
        .iter()
        .map(|r| match &r.covering {
            None => format!("{}: organism not in coverage table, activity unconfirmed", r.reported),
            Some(drugs) if drugs.is_empty() => {
                format!("{}: not covered by the selected drugs", r.reported)
            }
            Some(drugs) => format!(
                "{}: covered by {}",
                r.reported,
                drugs
                    .iter()
                    .map(|d| d.canonical_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
        .collect();

    let confirmed = results
        .iter()
        .find_map(|r| match &r.covering {
            Some(drugs) if !drugs.is_empty() => Some((r.reported, drugs)),
            _ => None,
        });

    let alert = match confirmed {
        Some((organism, drugs)) => {
            let mut builder = AlertBuilder::new(
                SOURCE,
                RULE_CULTURE,
                AlertCategory::Efficacy,
                AlertSeverity::Low,
                MessageTemplates::culture_covered(&drugs[0].canonical_name, organism),
            )
            .passed();
            for drug in drugs {
                builder = builder.drug(drug);
            }
            builder
        }
        None => {
            let organisms: Vec<&str> = results.iter().map(|r| r.reported).collect();
            AlertBuilder::new(
                SOURCE,
                RULE_CULTURE,
                AlertCategory::Efficacy,
                AlertSeverity::High,
                MessageTemplates::culture_not_covered(&organisms),
            )
            .drug_ids(input.drugs.iter().map(|d| d.id.clone()))
            .recommend("Select an agent active against the cultured organism(s).")
            .recommend("Review susceptibility results with microbiology.")
            .justified_override()
        }
    };

    let alert = evidence
        .into_iter()
        .fold(alert, |builder, line| builder.evidence(line))
        .build();
    findings.push(alert);
}

// ---------------------------------------------------------------------------
// Breadth
// ---------------------------------------------------------------------------

fn check_breadth(input: &RuleInput<'_>, findings: &mut Findings) {
    let has_broad_spectrum = !drugs_in(input.drugs, &input.rules.broad_spectrum).is_empty();
    if has_broad_spectrum {
        return;
    }

    match input.context.infection_severity {
        Some(InfectionSeverity::Severe) => findings.push(
            AlertBuilder::new(
                SOURCE,
                RULE_BREADTH,
                AlertCategory::Efficacy,
                AlertSeverity::High,
                MessageTemplates::breadth_severe(),
            )
            .drug_ids(input.drugs.iter().map(|d| d.id.clone()))
            .evidence("Infection severity: severe")
            .evidence("No carbapenem, antipseudomonal beta-lactam or polymyxin selected")
            .recommend("Consider broad-spectrum empirical therapy until cultures return.")
            .justified_override()
            .build(),
        ),
        Some(_) => {}
        None => {
            let selection: Vec<&Drug> = input.drugs.iter().collect();
            findings.missing_once(
                SOURCE,
                RULE_BREADTH,
                AlertCategory::Efficacy,
                AlertSeverity::Low,
                "infection_severity",
                "under-treatment of a severe infection",
                &selection,
            );
        }
    }
}
