use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Drug;

use super::catalog::DrugCatalog;
use super::interactions::{InteractionFact, InteractionTable};
use super::matching::{mentions, normalize_term};
use super::KnowledgeError;

pub const DRUGS_FILE: &str = "drugs.json";
pub const INTERACTIONS_FILE: &str = "interactions.json";
pub const RULES_FILE: &str = "rules.json";

const BUNDLED_DRUGS: &str = include_str!("../../resources/drugs.json");
const BUNDLED_INTERACTIONS: &str = include_str!("../../resources/interactions.json");
const BUNDLED_RULES: &str = include_str!("../../resources/rules.json");

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

/// A set of drugs named by class and/or by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrugSet {
    pub classes: Vec<String>,
    pub drugs: Vec<String>,
}

impl DrugSet {
    pub fn contains(&self, drug: &Drug) -> bool {
        let class = normalize_term(&drug.class);
        let id = normalize_term(&drug.id);
        self.classes.iter().any(|c| normalize_term(c) == class)
            || self.drugs.iter().any(|d| normalize_term(d) == id)
    }
}

/// Allergy keywords mapped to the drugs that cross-react with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllergyGroup {
    pub name: String,
    pub keywords: Vec<String>,
    pub members: DrugSet,
}

impl AllergyGroup {
    pub fn matches_allergy(&self, allergy: &str) -> bool {
        self.keywords.iter().any(|k| mentions(allergy, k))
    }
}

/// Organism and the drugs known to be active against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganismCoverage {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub covered_by: DrugSet,
}

impl OrganismCoverage {
    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// A comorbidity that makes some drugs hazardous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComorbidityCaution {
    pub condition: String,
    pub keywords: Vec<String>,
    pub applies_to: DrugSet,
    pub caution: String,
}

impl ComorbidityCaution {
    pub fn matches_comorbidity(&self, comorbidity: &str) -> bool {
        mentions(comorbidity, &self.condition)
            || self.keywords.iter().any(|k| mentions(comorbidity, k))
    }
}

/// Drug-class metadata consulted by the rule evaluators (rules.json).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalRuleSet {
    pub teratogenic: DrugSet,
    pub nephrotoxic: DrugSet,
    pub hepatotoxic: DrugSet,
    pub elderly_high_risk: DrugSet,
    pub narrow_therapeutic_index: DrugSet,
    pub broad_spectrum: DrugSet,
    pub allergy_groups: Vec<AllergyGroup>,
    pub organisms: Vec<OrganismCoverage>,
    pub comorbidity_cautions: Vec<ComorbidityCaution>,
}

impl ClinicalRuleSet {
    /// Every drug id named by a rule table must exist in the catalog.
    pub fn check_against(&self, catalog: &DrugCatalog) -> Result<(), KnowledgeError> {
        let named_sets = [
            ("teratogenic", &self.teratogenic),
            ("nephrotoxic", &self.nephrotoxic),
            ("hepatotoxic", &self.hepatotoxic),
            ("elderly_high_risk", &self.elderly_high_risk),
            ("narrow_therapeutic_index", &self.narrow_therapeutic_index),
            ("broad_spectrum", &self.broad_spectrum),
        ];
        let grouped = self
            .allergy_groups
            .iter()
            .map(|g| (g.name.as_str(), &g.members))
            .chain(self.organisms.iter().map(|o| (o.name.as_str(), &o.covered_by)))
            .chain(
                self.comorbidity_cautions
                    .iter()
                    .map(|c| (c.condition.as_str(), &c.applies_to)),
            );

        for (context, set) in named_sets.into_iter().chain(grouped) {
            for id in &set.drugs {
                if catalog.get(id).is_none() {
                    return Err(KnowledgeError::UnknownDrug {
                        id: id.clone(),
                        context: format!("rule set '{context}'"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Allergy groups whose keywords appear in the allergy entry.
    pub fn allergy_groups_for<'a>(
        &'a self,
        allergy: &'a str,
    ) -> impl Iterator<Item = &'a AllergyGroup> + 'a {
        self.allergy_groups
            .iter()
            .filter(move |g| g.matches_allergy(allergy))
    }

    /// Identify a reported organism: the longest organism name or alias the
    /// report mentions. Earlier entries win ties.
    pub fn identify_organism(&self, reported: &str) -> Option<&OrganismCoverage> {
        let reported = normalize_term(reported);
        let mut best: Option<(&OrganismCoverage, usize)> = None;

        for organism in &self.organisms {
            for name in organism.names() {
                let name = normalize_term(name);
                if name.is_empty() || !reported.contains(&name) {
                    continue;
                }
                let len = name.chars().count();
                if best.map_or(true, |(_, top)| len > top) {
                    best = Some((organism, len));
                }
            }
        }

        best.map(|(organism, _)| organism)
    }

    pub fn cautions_for<'a>(
        &'a self,
        comorbidity: &'a str,
    ) -> impl Iterator<Item = &'a ComorbidityCaution> + 'a {
        self.comorbidity_cautions
            .iter()
            .filter(move |c| c.matches_comorbidity(comorbidity))
    }
}

// ---------------------------------------------------------------------------
// KnowledgeBase
// ---------------------------------------------------------------------------

/// Loaded, validated reference data. Read-only after construction.
pub struct KnowledgeBase {
    pub catalog: DrugCatalog,
    pub interactions: InteractionTable,
    pub rules: ClinicalRuleSet,
    fingerprint: String,
}

impl KnowledgeBase {
    /// Parse and cross-check the three dataset documents.
    pub fn from_json(
        drugs_json: &str,
        interactions_json: &str,
        rules_json: &str,
    ) -> Result<Self, KnowledgeError> {
        let drugs: Vec<Drug> = serde_json::from_str(drugs_json)
            .map_err(|e| KnowledgeError::ReferenceDataParse(DRUGS_FILE.into(), e.to_string()))?;
        let facts: Vec<InteractionFact> = serde_json::from_str(interactions_json).map_err(|e| {
            KnowledgeError::ReferenceDataParse(INTERACTIONS_FILE.into(), e.to_string())
        })?;
        let rules: ClinicalRuleSet = serde_json::from_str(rules_json)
            .map_err(|e| KnowledgeError::ReferenceDataParse(RULES_FILE.into(), e.to_string()))?;

        let catalog = DrugCatalog::new(drugs)?;
        let interactions = InteractionTable::new(facts, &catalog)?;
        rules.check_against(&catalog)?;

        let fingerprint = compute_fingerprint(&[drugs_json, interactions_json, rules_json]);

        tracing::info!(
            drugs = catalog.len(),
            interactions = interactions.len(),
            fingerprint = %fingerprint,
            "Knowledge base loaded"
        );

        Ok(Self {
            catalog,
            interactions,
            rules,
            fingerprint,
        })
    }

    /// Load the dataset files from a directory.
    pub fn load(resources_dir: &Path) -> Result<Self, KnowledgeError> {
        let read = |file: &str| {
            let path = resources_dir.join(file);
            std::fs::read_to_string(&path).map_err(|e| {
                KnowledgeError::ReferenceDataLoad(path.display().to_string(), e.to_string())
            })
        };

        let drugs_json = read(DRUGS_FILE)?;
        let interactions_json = read(INTERACTIONS_FILE)?;
        let rules_json = read(RULES_FILE)?;
        Self::from_json(&drugs_json, &interactions_json, &rules_json)
    }

    /// The dataset compiled into the crate.
    pub fn builtin() -> Result<Self, KnowledgeError> {
        Self::from_json(BUNDLED_DRUGS, BUNDLED_INTERACTIONS, BUNDLED_RULES)
    }

    /// SHA-256 of the dataset documents, base64. Identifies the exact
    /// reference data a report was produced against.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn compute_fingerprint(documents: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update((doc.len() as u64).to_le_bytes());
        hasher.update(doc.as_bytes());
    }
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}
