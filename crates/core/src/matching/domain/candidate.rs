use serde::Serialize;

/// Which matching stage produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Exact alias match on a species pinned to a tile.
    FastTiles,
    /// Exact alias match on a site-allowed species at high confidence.
    FastSite,
    /// Background fuzzy match.
    Fuzzy,
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::FastTiles => "fast_tiles",
            CandidateSource::FastSite => "fast_site",
            CandidateSource::Fuzzy => "fuzzy",
        }
    }
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked species match. `score` is in [0, 1], higher is better.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub species_id: String,
    pub display_name: String,
    pub score: f64,
    pub is_in_tiles: bool,
    pub source: CandidateSource,
}
