use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::InteractionSeverity;

use super::catalog::DrugCatalog;
use super::matching::normalize_term;
use super::KnowledgeError;

/// A known drug–drug interaction. `(drug_a, drug_b)` is an unordered pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionFact {
    pub drug_a: String,
    pub drug_b: String,
    pub severity: InteractionSeverity,
    pub description: String,
    #[serde(alias = "management_strategy")]
    pub management: String,
}

impl InteractionFact {
    pub fn key(&self) -> PairKey {
        PairKey::new(&self.drug_a, &self.drug_b)
    }

    /// Same fact with its ids in canonical (sorted) order.
    fn canonicalized(mut self) -> Self {
        let key = self.key();
        self.drug_a = key.first().to_string();
        self.drug_b = key.second().to_string();
        self
    }
}

// ---------------------------------------------------------------------------
// PairKey
// ---------------------------------------------------------------------------

/// Order-independent key for a drug pair: the two normalized ids, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        let a = normalize_term(a);
        let b = normalize_term(b);
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn first(&self) -> &str {
        &self.0
    }

    pub fn second(&self) -> &str {
        &self.1
    }

    pub fn is_self_pair(&self) -> bool {
        self.0 == self.1
    }
}

// ---------------------------------------------------------------------------
// InteractionTable
// ---------------------------------------------------------------------------

/// Interaction facts keyed by [`PairKey`] for O(1) symmetric lookup.
pub struct InteractionTable {
    facts: HashMap<PairKey, InteractionFact>,
}

impl InteractionTable {
    /// Build the table. Rejects self pairs, duplicate unordered pairs and ids
    /// missing from the catalog.
    pub fn new(
        facts: Vec<InteractionFact>,
        catalog: &DrugCatalog,
    ) -> Result<Self, KnowledgeError> {
        let mut table = HashMap::with_capacity(facts.len());

        for fact in facts {
            let key = fact.key();
            if key.is_self_pair() {
                return Err(KnowledgeError::SelfInteraction(fact.drug_a.clone()));
            }
            for id in [&fact.drug_a, &fact.drug_b] {
                if catalog.get(id).is_none() {
                    return Err(KnowledgeError::UnknownDrug {
                        id: id.clone(),
                        context: "interaction table".into(),
                    });
                }
            }
            if table.contains_key(&key) {
                return Err(KnowledgeError::DuplicateInteraction {
                    drug_a: key.first().to_string(),
                    drug_b: key.second().to_string(),
                });
            }
            table.insert(key, fact.canonicalized());
        }

        Ok(Self { facts: table })
    }

    /// Symmetric lookup: `lookup(a, b) == lookup(b, a)`.
    pub fn lookup(&self, a: &str, b: &str) -> Option<&InteractionFact> {
        self.facts.get(&PairKey::new(a, b))
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// All facts sorted by pair key.
    pub fn facts(&self) -> Vec<&InteractionFact> {
        let mut facts: Vec<&InteractionFact> = self.facts.values().collect();
        facts.sort_by_key(|f| f.key());
        facts
    }
}
