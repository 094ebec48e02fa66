use std::collections::BTreeMap;

use crate::knowledge::{InteractionFact, InteractionTable, PairKey};
use crate::models::{AlertCategory, AlertSeverity, Drug, FindingKind, InteractionSeverity};

use super::messages::MessageTemplates;
use super::types::{AlertBuilder, ClinicalAlert};

pub const LOOKUP_SOURCE: &str = "interaction_lookup";
pub const INTERACTION_RULE: &str = "safety.interaction";

/// Outcome of looking up one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairStatus<'a> {
    Interaction(&'a InteractionFact),
    NoKnownInteraction,
    /// The pair was not part of the checked selection.
    NotChecked,
}

/// Every pair checked for a selection, and the facts that matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionCheck {
    results: BTreeMap<PairKey, Option<InteractionFact>>,
}

impl InteractionCheck {
    pub fn pairs_checked(&self) -> usize {
        self.results.len()
    }

    pub fn pairs(&self) -> impl Iterator<Item = &PairKey> {
        self.results.keys()
    }

    /// Matched facts, sorted by pair.
    pub fn interactions(&self) -> Vec<&InteractionFact> {
        self.results.values().flatten().collect()
    }

    pub fn status(&self, a: &str, b: &str) -> PairStatus<'_> {
        match self.results.get(&PairKey::new(a, b)) {
            Some(Some(fact)) => PairStatus::Interaction(fact),
            Some(None) => PairStatus::NoKnownInteraction,
            None => PairStatus::NotChecked,
        }
    }
}

/// All unordered pairs `(drugs[i], drugs[j])` with `i < j`.
pub fn unordered_pairs(drugs: &[Drug]) -> Vec<(&Drug, &Drug)> {
    let mut pairs = Vec::with_capacity(drugs.len() * drugs.len().saturating_sub(1) / 2);
    for (i, a) in drugs.iter().enumerate() {
        for b in &drugs[i + 1..] {
            pairs.push((a, b));
        }
    }
    pairs
}

/// Check every unordered pair of the selection against the table.
pub fn find_interactions(drugs: &[Drug], table: &InteractionTable) -> InteractionCheck {
    let mut results = BTreeMap::new();
    for (a, b) in unordered_pairs(drugs) {
        let key = PairKey::new(&a.id, &b.id);
        if key.is_self_pair() {
            continue;
        }
        results.insert(key, table.lookup(&a.id, &b.id).cloned());
    }

    tracing::debug!(
        drugs = drugs.len(),
        pairs = results.len(),
        matches = results.values().filter(|r| r.is_some()).count(),
        "Interaction lookup complete"
    );

    InteractionCheck { results }
}

/// One safety alert per matched interaction.
///
/// Severe interactions become critical alerts that need a written
/// justification to override; moderate and mild ones are overridable as is.
pub fn interaction_alerts(check: &InteractionCheck, drugs: &[Drug]) -> Vec<ClinicalAlert> {
    let display = |id: &str| -> String {
        drugs
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.canonical_name.clone())
            .unwrap_or_else(|| id.to_string())
    };

    check
        .interactions()
        .into_iter()
        .map(|fact| {
            let builder = AlertBuilder::new(
                LOOKUP_SOURCE,
                INTERACTION_RULE,
                AlertCategory::Safety,
                AlertSeverity::from(fact.severity),
                MessageTemplates::interaction(
                    &display(&fact.drug_a),
                    &display(&fact.drug_b),
                    fact.severity,
                    &fact.description,
                ),
            )
            .kind(FindingKind::Interaction)
            .drug_ids([fact.drug_a.clone(), fact.drug_b.clone()])
            .evidence(format!(
                "Interaction table: {} + {} ({})",
                fact.drug_a,
                fact.drug_b,
                fact.severity.as_str()
            ))
            .recommend(fact.management.clone());

            if fact.severity == InteractionSeverity::Severe {
                builder.justified_override().build()
            } else {
                builder.overridable().build()
            }
        })
        .collect()
}
