use std::collections::BTreeMap;

use crate::knowledge::matching::{normalize_term, overlap_len};
use crate::knowledge::{ClinicalRuleSet, ComorbidityCaution};
use crate::models::{AlertCategory, AlertSeverity, Drug, HepaticStatus};
use crate::validation::messages::MessageTemplates;
use crate::validation::types::{AlertBuilder, EvaluatorError};

use super::{drugs_in, usable_measurement, Findings, RuleEvaluator, RuleInput};

const SOURCE: &str = "safety";

pub const RULE_PREGNANCY: &str = "safety.pregnancy";
pub const RULE_RENAL: &str = "safety.renal";
pub const RULE_ELDERLY: &str = "safety.elderly";
pub const RULE_ALLERGY: &str = "safety.allergy";
pub const RULE_HEPATIC: &str = "safety.hepatic";
pub const RULE_COMORBIDITY: &str = "safety.comorbidity";

/// How an allergy entry matched a drug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllergyMatch {
    /// The entry names the drug (or the drug's name contains the entry).
    Direct,
    /// The entry names a class that cross-reacts with the drug.
    CrossReactive { group: String },
}

/// Match one free-text allergy entry against a drug.
///
/// Direct name matches are tried first, then the cross-reactivity table.
pub fn match_allergy(allergy: &str, drug: &Drug, rules: &ClinicalRuleSet) -> Option<AllergyMatch> {
    let entry = normalize_term(allergy);
    if entry.is_empty() {
        return None;
    }

    if drug
        .names()
        .any(|name| overlap_len(&entry, &normalize_term(&name)).is_some())
    {
        return Some(AllergyMatch::Direct);
    }

    rules
        .allergy_groups_for(allergy)
        .find(|group| group.members.contains(drug))
        .map(|group| AllergyMatch::CrossReactive {
            group: group.name.clone(),
        })
}

/// Pregnancy, renal, elderly, allergy, hepatic and comorbidity checks.
pub struct SafetyEvaluator;

impl RuleEvaluator for SafetyEvaluator {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn category(&self) -> AlertCategory {
        AlertCategory::Safety
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Result<Findings, EvaluatorError> {
        let mut findings = Findings::default();

        check_pregnancy(input, &mut findings);
        check_renal(input, &mut findings);
        check_elderly(input, &mut findings);
        check_allergies(input, &mut findings);
        check_hepatic(input, &mut findings);
        check_comorbidities(input, &mut findings);

        Ok(findings)
    }
}

// ---------------------------------------------------------------------------
// Pregnancy
// ---------------------------------------------------------------------------

fn check_pregnancy(input: &RuleInput<'_>, findings: &mut Findings) {
    let teratogenic = drugs_in(input.drugs, &input.rules.teratogenic);
    if teratogenic.is_empty() {
        return;
    }

    match input.context.pregnancy {
        Some(true) => {
            for drug in teratogenic {
                findings.push(
                    AlertBuilder::new(
                        SOURCE,
                        RULE_PREGNANCY,
                        AlertCategory::Safety,
                        AlertSeverity::Critical,
                        MessageTemplates::pregnancy(&drug.canonical_name),
                    )
                    .drug(drug)
                    .evidence("Pregnancy: yes")
                    .evidence(format!("{} ({}) is on the teratogenic list", drug.canonical_name, drug.class))
                    .recommend("Select a pregnancy-compatible alternative.")
                    .justified_override()
                    .build(),
                );
            }
        }
        Some(false) => {}
        None => findings.missing(
            SOURCE,
            RULE_PREGNANCY,
            AlertCategory::Safety,
            AlertSeverity::Moderate,
            "pregnancy",
            "fetal harm",
            &teratogenic,
        ),
    }
}

// ---------------------------------------------------------------------------
// Renal
// ---------------------------------------------------------------------------

fn check_renal(input: &RuleInput<'_>, findings: &mut Findings) {
    let nephrotoxic = drugs_in(input.drugs, &input.rules.nephrotoxic);
    if nephrotoxic.is_empty() {
        return;
    }

    let Some(recorded) = input.context.renal_function else {
        findings.missing(
            SOURCE,
            RULE_RENAL,
            AlertCategory::Safety,
            AlertSeverity::Moderate,
            "renal_function",
            "nephrotoxicity",
            &nephrotoxic,
        );
        return;
    };
    let Some(egfr) = usable_measurement(recorded) else {
        findings.unusable(
            SOURCE,
            RULE_RENAL,
            AlertCategory::Safety,
            AlertSeverity::Moderate,
            "renal_function",
            recorded,
            "nephrotoxicity",
            &nephrotoxic,
        );
        return;
    };

    let thresholds = &input.policy.renal;
    if egfr >= thresholds.impairment_egfr {
        return;
    }
    let (severity, threshold) = if egfr < thresholds.severe_impairment_egfr {
        (AlertSeverity::Critical, thresholds.severe_impairment_egfr)
    } else {
        (AlertSeverity::High, thresholds.impairment_egfr)
    };

    for drug in nephrotoxic {
        findings.push(
            AlertBuilder::new(
                SOURCE,
                RULE_RENAL,
                AlertCategory::Safety,
                severity,
                MessageTemplates::renal(&drug.canonical_name, egfr, threshold),
            )
            .drug(drug)
            .evidence(format!("eGFR: {:.0} mL/min/1.73m²", egfr))
            .recommend("Adjust dose or interval for renal function.")
            .recommend("Monitor serum creatinine during therapy.")
            .build(),
        );
    }
}

// ---------------------------------------------------------------------------
// Elderly
// ---------------------------------------------------------------------------

fn check_elderly(input: &RuleInput<'_>, findings: &mut Findings) {
    let at_risk = drugs_in(input.drugs, &input.rules.elderly_high_risk);
    if at_risk.is_empty() {
        return;
    }

    match input.context.age {
        Some(age) if age > input.policy.elderly_age => {
            for drug in at_risk {
                findings.push(
                    AlertBuilder::new(
                        SOURCE,
                        RULE_ELDERLY,
                        AlertCategory::Safety,
                        AlertSeverity::Moderate,
                        MessageTemplates::elderly(&drug.canonical_name, age),
                    )
                    .drug(drug)
                    .evidence(format!("Age: {}", age))
                    .recommend("Consider a lower-risk alternative or closer monitoring.")
                    .overridable()
                    .build(),
                );
            }
        }
        Some(_) => {}
        None => findings.missing(
            SOURCE,
            RULE_ELDERLY,
            AlertCategory::Safety,
            AlertSeverity::Low,
            "age",
            "age-related adverse effects",
            &at_risk,
        ),
    }
}

// ---------------------------------------------------------------------------
// Allergy
// ---------------------------------------------------------------------------

fn check_allergies(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.context.allergies.is_none() {
        let selection: Vec<&Drug> = input.drugs.iter().collect();
        findings.missing_once(
            SOURCE,
            RULE_ALLERGY,
            AlertCategory::Safety,
            AlertSeverity::Moderate,
            "allergies",
            "an allergic reaction",
            &selection,
        );
        return;
    }

    // One alert per drug and match basis, whatever the number of entries
    // that lead to it.
    let mut matches: BTreeMap<(&str, String), (&Drug, AllergyMatch, Vec<&str>)> = BTreeMap::new();
    for allergy in input.context.recorded_allergies() {
        for drug in input.drugs {
            let Some(matched) = match_allergy(allergy, drug, input.rules) else {
                continue;
            };
            let basis = match &matched {
                AllergyMatch::Direct => "direct".to_string(),
                AllergyMatch::CrossReactive { group } => format!("group:{}", normalize_term(group)),
            };
            let entries = &mut matches
                .entry((drug.id.as_str(), basis))
                .or_insert_with(|| (drug, matched, Vec::new()))
                .2;
            if !entries.iter().any(|e| normalize_term(e) == normalize_term(allergy)) {
                entries.push(allergy);
            }
        }
    }

    for ((_, basis), (drug, matched, entries)) in matches {
        let first = entries.first().copied().unwrap_or_default();
        let (message, match_line) = match &matched {
            AllergyMatch::Direct => (
                MessageTemplates::allergy_direct(first, &drug.canonical_name),
                "Match: direct".to_string(),
            ),
            AllergyMatch::CrossReactive { group } => (
                MessageTemplates::allergy_cross_reactive(first, &drug.canonical_name, group),
                format!("Match: cross-reactive ({} group)", group),
            ),
        };

        let mut builder = AlertBuilder::new(
            SOURCE,
            RULE_ALLERGY,
            AlertCategory::Safety,
            AlertSeverity::Critical,
            message,
        )
        .drug(drug);
        for entry in &entries {
            builder = builder.evidence(format!("Allergy entry: {}", entry));
        }
        findings.push(
            builder
                .evidence(match_line)
                .recommend("Choose an agent outside the implicated class.")
                .recommend("If the reaction history is doubtful, document a risk assessment.")
                .justified_override()
                .discriminator(basis)
                .build(),
        );
    }
}

// ---------------------------------------------------------------------------
// Hepatic
// ---------------------------------------------------------------------------

fn check_hepatic(input: &RuleInput<'_>, findings: &mut Findings) {
    let hepatotoxic = drugs_in(input.drugs, &input.rules.hepatotoxic);
    if hepatotoxic.is_empty() {
        return;
    }

    let Some(status) = input.context.hepatic_status else {
        findings.missing(
            SOURCE,
            RULE_HEPATIC,
            AlertCategory::Safety,
            AlertSeverity::Low,
            "hepatic_status",
            "hepatotoxicity",
            &hepatotoxic,
        );
        return;
    };
    let severity = match status {
        HepaticStatus::Normal | HepaticStatus::Mild => return,
        HepaticStatus::Moderate => AlertSeverity::Moderate,
        HepaticStatus::Severe => AlertSeverity::High,
    };

    for drug in hepatotoxic {
        findings.push(
            AlertBuilder::new(
                SOURCE,
                RULE_HEPATIC,
                AlertCategory::Safety,
                severity,
                MessageTemplates::hepatic(&drug.canonical_name, status),
            )
            .drug(drug)
            .evidence(format!("Hepatic status: {}", status))
            .recommend("Reduce dose or select a non-hepatotoxic alternative.")
            .recommend("Monitor liver function tests.")
            .build(),
        );
    }
}

// ---------------------------------------------------------------------------
// Comorbidity
// ---------------------------------------------------------------------------

fn check_comorbidities(input: &RuleInput<'_>, findings: &mut Findings) {
    // Keyed by caution position so two entries naming one condition share an alert.
    let mut matches: BTreeMap<(usize, &str), (&ComorbidityCaution, &Drug, Vec<&str>)> =
        BTreeMap::new();
    for comorbidity in &input.context.comorbidities {
        let comorbidity = comorbidity.trim();
        if comorbidity.is_empty() {
            continue;
        }
        for (index, caution) in input.rules.comorbidity_cautions.iter().enumerate() {
            if !caution.matches_comorbidity(comorbidity) {
                continue;
            }
            for drug in drugs_in(input.drugs, &caution.applies_to) {
                let entries = &mut matches
                    .entry((index, drug.id.as_str()))
                    .or_insert_with(|| (caution, drug, Vec::new()))
                    .2;
                if !entries.iter().any(|e| normalize_term(e) == normalize_term(comorbidity)) {
                    entries.push(comorbidity);
                }
            }
        }
    }

    for ((index, _), (caution, drug, entries)) in matches {
        let mut builder = AlertBuilder::new(
            SOURCE,
            RULE_COMORBIDITY,
            AlertCategory::Safety,
            AlertSeverity::High,
            MessageTemplates::comorbidity(&drug.canonical_name, &caution.condition, &caution.caution),
        )
        .drug(drug);
        for entry in &entries {
            builder = builder.evidence(format!("Comorbidity: {}", entry));
        }
        findings.push(
            builder
                .recommend("Prefer an agent without this caution.")
                .justified_override()
                .discriminator(format!("{}#{}", caution.condition, index))
                .build(),
        );
    }
}
