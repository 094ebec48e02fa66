use serde::{Deserialize, Serialize};

/// Canonical drug record from the catalog.
/// `class` drives class-level rules (allergy groups, teratogenic sets, coverage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drug {
    pub id: String,
    pub canonical_name: String,
    pub class: String,
    pub category: String,
    /// Brand names, abbreviations and other display names that map to this drug.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Drug {
    /// All lowercase names this drug answers to (id, canonical name, aliases).
    pub fn names(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.id.to_lowercase())
            .chain(std::iter::once(self.canonical_name.to_lowercase()))
            .chain(self.aliases.iter().map(|a| a.to_lowercase()))
    }
}
