use crate::models::{HepaticStatus, InteractionSeverity};

/// Message template builder for consistent clinician-facing wording.
/// Messages name the drug and the triggering fact; recommendations are
/// attached separately by the evaluators.
pub struct MessageTemplates;

impl MessageTemplates {
    /// Drug–drug interaction.
    pub fn interaction(
        drug_a: &str,
        drug_b: &str,
        severity: InteractionSeverity,
        description: &str,
    ) -> String {
        format!(
            "{} interaction between {} and {}: {}",
            capitalize(severity.as_str()),
            drug_a,
            drug_b,
            description,
        )
    }

    pub fn pregnancy(drug: &str) -> String {
        format!(
            "{} is contraindicated or high-risk in pregnancy and the patient is pregnant.",
            drug,
        )
    }

    pub fn renal(drug: &str, egfr: f64, threshold: f64) -> String {
        format!(
            "{} is nephrotoxic and eGFR is {:.0} mL/min/1.73m² (below {:.0}).",
            drug, egfr, threshold,
        )
    }

    pub fn elderly(drug: &str, age: u32) -> String {
        format!(
            "{} carries elevated adverse-event risk in older adults (patient age {}).",
            drug, age,
        )
    }

    pub fn allergy_direct(allergy: &str, drug: &str) -> String {
        format!(
            "Recorded allergy \"{}\" matches {} directly.",
            allergy, drug,
        )
    }

    pub fn allergy_cross_reactive(allergy: &str, drug: &str, group: &str) -> String {
        format!(
            "Recorded allergy \"{}\" indicates {} sensitivity; {} may cross-react.",
            allergy, group, drug,
        )
    }

    pub fn hepatic(drug: &str, status: HepaticStatus) -> String {
        format!(
            "{} is hepatotoxic and the patient has {} hepatic impairment.",
            drug,
            status.as_str(),
        )
    }

    pub fn comorbidity(drug: &str, condition: &str, caution: &str) -> String {
        format!(
            "{} {} in a patient with {}.",
            drug, caution, condition,
        )
    }

    pub fn culture_not_covered(organisms: &[&str]) -> String {
        format!(
            "No selected drug is confirmed active against the reported organism(s): {}.",
            organisms.join(", "),
        )
    }

    pub fn culture_covered(drug: &str, organism: &str) -> String {
        format!("{} covers the reported organism {}.", drug, organism)
    }

    pub fn breadth_severe() -> String {
        "Severe infection without a broad-spectrum agent in the regimen.".to_string()
    }

    pub fn weight_out_of_band(weight_kg: f64, min: f64, max: f64) -> String {
        format!(
            "Patient weight {:.1} kg is outside the standard dosing band ({:.0}-{:.0} kg).",
            weight_kg, min, max,
        )
    }

    pub fn pediatric(age: u32) -> String {
        format!(
            "Paediatric patient (age {}): adult standard doses do not apply.",
            age,
        )
    }

    pub fn duplicate_selection(drug: &str, references: &[String]) -> String {
        format!(
            "{} was selected more than once ({}).",
            drug,
            references.join(", "),
        )
    }

    pub fn monitoring(drug: &str) -> String {
        format!(
            "{} has a narrow therapeutic index: baseline and follow-up levels are required.",
            drug,
        )
    }

    /// Missing context field that a rule needed.
    pub fn insufficient_data(field: &str, concern: &str) -> String {
        format!(
            "{} not recorded: cannot rule out {}.",
            field, concern,
        )
    }

    pub fn unusable_measurement(field: &str, value: f64, concern: &str) -> String {
        format!(
            "{} has an unusable value ({}): cannot rule out {}.",
            field, value, concern,
        )
    }

    pub fn evaluator_failure(evaluator: &str) -> String {
        format!("Evaluator {} failed: manual review required.", evaluator)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
