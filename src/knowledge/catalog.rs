use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Drug;

use super::matching::{normalize_term, overlap_len};
use super::KnowledgeError;

// ---------------------------------------------------------------------------
// Resolution errors
// ---------------------------------------------------------------------------

/// Why a drug reference could not be resolved to exactly one canonical drug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum UnresolvedReason {
    NotFound,
    /// Several canonical drugs matched equally well. Candidates are drug ids.
    Ambiguous { candidates: Vec<String> },
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Unresolved drug reference '{reference}': {}", describe(.reason))]
pub struct UnresolvedDrugReference {
    pub reference: String,
    pub reason: UnresolvedReason,
}

fn describe(reason: &UnresolvedReason) -> String {
    match reason {
        UnresolvedReason::NotFound => "no matching drug".to_string(),
        UnresolvedReason::Ambiguous { candidates } => {
            format!("ambiguous between {}", candidates.join(", "))
        }
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Several references that resolved to the same canonical drug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateSelection {
    pub drug_id: String,
    pub references: Vec<String>,
}

/// Result of resolving a whole drug selection.
/// `drugs` is de-duplicated and sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSelection {
    pub drugs: Vec<Drug>,
    pub duplicates: Vec<DuplicateSelection>,
}

// ---------------------------------------------------------------------------
// DrugCatalog
// ---------------------------------------------------------------------------

/// Canonical drug records plus a name index (id, canonical name, aliases).
pub struct DrugCatalog {
    drugs: Vec<Drug>,
    by_name: HashMap<String, usize>,
}

impl DrugCatalog {
    /// Build the catalog, rejecting duplicate ids and names shared by two drugs.
    pub fn new(drugs: Vec<Drug>) -> Result<Self, KnowledgeError> {
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut ids = BTreeSet::new();

        for (index, drug) in drugs.iter().enumerate() {
            let id = normalize_term(&drug.id);
            if id.is_empty() {
                return Err(KnowledgeError::InvalidDrug(format!(
                    "drug '{}' has an empty id",
                    drug.canonical_name
                )));
            }
            if !ids.insert(id.clone()) {
                return Err(KnowledgeError::DuplicateDrug(drug.id.clone()));
            }

            for name in drug.names().map(|n| normalize_term(&n)) {
                if name.is_empty() {
                    continue;
                }
                match by_name.get(&name) {
                    Some(&other) if other != index => {
                        return Err(KnowledgeError::AliasCollision {
                            name,
                            first: drugs[other].id.clone(),
                            second: drug.id.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        by_name.insert(name, index);
                    }
                }
            }
        }

        Ok(Self { drugs, by_name })
    }

    pub fn len(&self) -> usize {
        self.drugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drugs.is_empty()
    }

    pub fn drugs(&self) -> &[Drug] {
        &self.drugs
    }

    /// Exact lookup by id (case-insensitive).
    pub fn get(&self, id: &str) -> Option<&Drug> {
        let key = normalize_term(id);
        self.drugs.iter().find(|d| normalize_term(&d.id) == key)
    }

    /// Resolve a free-text or id reference to one canonical drug.
    ///
    /// Exact name/alias/id matches win. Otherwise the strongest bidirectional
    /// substring match wins; a tie between different drugs is ambiguous.
    pub fn resolve(&self, reference: &str) -> Result<&Drug, UnresolvedDrugReference> {
        let needle = normalize_term(reference);
        let not_found = || UnresolvedDrugReference {
            reference: reference.to_string(),
            reason: UnresolvedReason::NotFound,
        };

        if needle.is_empty() {
            return Err(not_found());
        }

        if let Some(&index) = self.by_name.get(&needle) {
            return Ok(&self.drugs[index]);
        }

        // Best overlap per drug, then pick the strongest drug(s).
        let mut best_per_drug: BTreeMap<usize, usize> = BTreeMap::new();
        for (name, &index) in &self.by_name {
            if let Some(strength) = overlap_len(&needle, name) {
                let entry = best_per_drug.entry(index).or_insert(0);
                *entry = (*entry).max(strength);
            }
        }

        let Some(&top) = best_per_drug.values().max() else {
            return Err(not_found());
        };

        let mut winners: Vec<&Drug> = best_per_drug
            .iter()
            .filter(|(_, strength)| **strength == top)
            .map(|(&index, _)| &self.drugs[index])
            .collect();

        if winners.len() == 1 {
            return Ok(winners.remove(0));
        }

        let mut candidates: Vec<String> = winners.iter().map(|d| d.id.clone()).collect();
        candidates.sort();
        tracing::debug!(
            reference = %reference,
            candidates = candidates.len(),
            "Ambiguous drug reference"
        );
        Err(UnresolvedDrugReference {
            reference: reference.to_string(),
            reason: UnresolvedReason::Ambiguous { candidates },
        })
    }

    /// Resolve a whole selection. Fails on the first unresolved reference.
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        references: &[S],
    ) -> Result<ResolvedSelection, UnresolvedDrugReference> {
        let mut by_id: BTreeMap<String, (Drug, Vec<String>)> = BTreeMap::new();

        for reference in references {
            let reference = reference.as_ref();
            let drug = self.resolve(reference)?;
            by_id
                .entry(drug.id.clone())
                .or_insert_with(|| (drug.clone(), Vec::new()))
                .1
                .push(reference.trim().to_string());
        }

        let mut drugs = Vec::with_capacity(by_id.len());
        let mut duplicates = Vec::new();
        for (id, (drug, refs)) in by_id {
            if refs.len() > 1 {
                let mut refs = refs;
                refs.sort();
                duplicates.push(DuplicateSelection {
                    drug_id: id,
                    references: refs,
                });
            }
            drugs.push(drug);
        }

        Ok(ResolvedSelection { drugs, duplicates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drug(id: &str, class: &str, aliases: &[&str]) -> Drug {
        Drug {
            id: id.into(),
            canonical_name: id.into(),
            class: class.into(),
            category: "antibiotic".into(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn catalog() -> DrugCatalog {
        DrugCatalog::new(vec![
            drug("amoxicillin", "penicillin", &["amoxil"]),
            drug(
                "amoxicillin-clavulanate",
                "penicillin",
                &["augmentin", "co-amoxiclav"],
            ),
            drug("vancomycin", "glycopeptide", &["vancocin"]),
            drug("gentamicin", "aminoglycoside", &[]),
            drug("ciprofloxacin", "fluoroquinolone", &["cipro"]),
        ])
        .unwrap()
    }

    #[test]
    fn exact_match_case_and_whitespace_insensitive() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("  AMOXICILLIN ").unwrap().id, "amoxicillin");
    }

    #[test]
    fn brand_resolves_to_generic() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("Augmentin").unwrap().id, "amoxicillin-clavulanate");
        assert_eq!(catalog.resolve("Vancocin").unwrap().id, "vancomycin");
    }

    #[test]
    fn exact_match_beats_longer_containing_name() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("amoxicillin").unwrap().id, "amoxicillin");
    }

    #[test]
    fn reference_containing_name_resolves() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("vancomycin 1g IV q12h").unwrap().id, "vancomycin");
    }

    #[test]
    fn longest_contained_name_wins() {
        let catalog = catalog();
        let drug = catalog.resolve("amoxicillin-clavulanate 875mg").unwrap();
        assert_eq!(drug.id, "amoxicillin-clavulanate");
    }

    #[test]
    fn partial_prefix_resolves_when_unique() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("genta").unwrap().id, "gentamicin");
    }

    #[test]
    fn tie_between_drugs_is_ambiguous() {
        let catalog = catalog();
        let err = catalog.resolve("amox").unwrap_err();
        assert_eq!(
            err.reason,
            UnresolvedReason::Ambiguous {
                candidates: vec!["amoxicillin".into(), "amoxicillin-clavulanate".into()]
            }
        );
    }

    #[test]
    fn unknown_reference_not_found() {
        let catalog = catalog();
        let err = catalog.resolve("unobtainium").unwrap_err();
        assert_eq!(err.reason, UnresolvedReason::NotFound);
        assert_eq!(err.reference, "unobtainium");
        assert!(catalog.resolve("   ").is_err());
    }

    #[test]
    fn too_short_fragment_not_found() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("va").unwrap_err().reason, UnresolvedReason::NotFound);
    }

    #[test]
    fn resolve_all_sorts_and_dedups() {
        let catalog = catalog();
        let selection = catalog
            .resolve_all(&["Vancocin", "cipro", "vancomycin"])
            .unwrap();
        let ids: Vec<&str> = selection.drugs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["ciprofloxacin", "vancomycin"]);
        assert_eq!(selection.duplicates.len(), 1);
        assert_eq!(selection.duplicates[0].drug_id, "vancomycin");
        assert_eq!(
            selection.duplicates[0].references,
            vec!["Vancocin".to_string(), "vancomycin".to_string()]
        );
    }

    #[test]
    fn resolve_all_propagates_failure() {
        let catalog = catalog();
        let err = catalog.resolve_all(&["vancomycin", "mystery"]).unwrap_err();
        assert_eq!(err.reference, "mystery");
    }

    #[test]
    fn duplicate_ids_rejected() {
        let result = DrugCatalog::new(vec![
            drug("vancomycin", "glycopeptide", &[]),
            drug("Vancomycin", "glycopeptide", &[]),
        ]);
        assert!(matches!(result, Err(KnowledgeError::DuplicateDrug(_))));
    }

    #[test]
    fn alias_shared_by_two_drugs_rejected() {
        let result = DrugCatalog::new(vec![
            drug("amoxicillin", "penicillin", &["amox"]),
            drug("amoxicillin-clavulanate", "penicillin", &["amox"]),
        ]);
        assert!(matches!(result, Err(KnowledgeError::AliasCollision { .. })));
    }
}
