use std::collections::{HashMap, HashSet};

/// Per-session snapshot the matchers read but never modify.
///
/// Owned by the session and shared with pending items through an `Arc`,
/// so it stays readable for as long as any queued retry may refer to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchContext {
    /// Species pinned to quick-access tiles.
    pub tiles_species_ids: HashSet<String>,
    /// Species permitted at the current location.
    pub site_allowed_ids: HashSet<String>,
    pub species_by_id: HashMap<String, String>,
}

impl MatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tiles<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tiles_species_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_site_allowed<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.site_allowed_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_species<I, K, V>(mut self, species: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.species_by_id
            .extend(species.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn is_tile(&self, species_id: &str) -> bool {
        self.tiles_species_ids.contains(species_id)
    }

    pub fn is_site_allowed(&self, species_id: &str) -> bool {
        self.site_allowed_ids.contains(species_id)
    }

    /// Display name for `species_id`, falling back to the id itself.
    pub fn display_name(&self, species_id: &str) -> String {
        self.species_by_id
            .get(species_id)
            .cloned()
            .unwrap_or_else(|| species_id.to_string())
    }
}
