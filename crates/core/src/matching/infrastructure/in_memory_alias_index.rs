use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::matching::domain::alias_index::{AliasIndex, AliasRecord, LookupError};
use crate::shared::text_normalizer::normalize;

#[derive(Error, Debug)]
pub enum AliasLoadError {
    #[error("failed to read alias file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse alias file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("species entry {index} has an empty id")]
    EmptySpecies { index: usize },
}

/// One species and the forms it may be spoken as.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SpeciesEntry {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AliasFile {
    species: Vec<SpeciesEntry>,
}

/// Alias table held in memory, keyed by normalized alias.
///
/// Lookup order is the order species and aliases were added. The display
/// name always counts as an alias of its own species.
#[derive(Debug, Default)]
pub struct InMemoryAliasIndex {
    by_alias: HashMap<String, Vec<AliasRecord>>,
    /// Normalized aliases in insertion order, for full scans.
    aliases: Vec<AliasRecord>,
    display_names: Vec<(String, String)>,
}

impl InMemoryAliasIndex {
    pub fn new(species: Vec<SpeciesEntry>) -> Result<Self, AliasLoadError> {
        let mut index = Self::default();
        for (i, entry) in species.into_iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(AliasLoadError::EmptySpecies { index: i });
            }
            index.insert(entry);
        }
        Ok(index)
    }

    /// Loads `{ "species": [{ "id", "display_name", "aliases": [...] }] }`.
    pub fn from_json_file(path: &Path) -> Result<Self, AliasLoadError> {
        let json = fs::read_to_string(path).map_err(|e| AliasLoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: AliasFile = serde_json::from_str(&json).map_err(|e| AliasLoadError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        let index = Self::new(file.species)?;
        log::info!(
            "Loaded {} aliases for {} species from {}",
            index.aliases.len(),
            index.display_names.len(),
            path.display()
        );
        Ok(index)
    }

    fn insert(&mut self, entry: SpeciesEntry) {
        let forms = std::iter::once(&entry.display_name).chain(entry.aliases.iter());
        for form in forms {
            let alias = normalize(form);
            if alias.is_empty() {
                continue;
            }
            let records = self.by_alias.entry(alias.clone()).or_default();
            if records.iter().any(|r| r.species_id == entry.id) {
                continue;
            }
            let record = AliasRecord {
                species_id: entry.id.clone(),
                alias,
            };
            records.push(record.clone());
            self.aliases.push(record);
        }
        self.display_names.push((entry.id, entry.display_name));
    }

    /// Every alias record, in insertion order.
    pub fn records(&self) -> &[AliasRecord] {
        &self.aliases
    }

    /// `(species_id, display_name)` pairs, in insertion order.
    pub fn display_names(&self) -> &[(String, String)] {
        &self.display_names
    }

    pub fn species_count(&self) -> usize {
        self.display_names.len()
    }
}

impl AliasIndex for InMemoryAliasIndex {
    fn find_exact(&self, normalized_text: &str) -> Result<Vec<AliasRecord>, LookupError> {
        Ok(self
            .by_alias
            .get(normalized_text)
            .cloned()
            .unwrap_or_default())
    }
}
