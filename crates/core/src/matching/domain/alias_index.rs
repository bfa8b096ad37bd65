use super::match_context::MatchContext;
use super::match_result::MatchResult;

pub type LookupError = Box<dyn std::error::Error + Send + Sync>;

/// One alias row: a spoken/written form mapped to a canonical species.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRecord {
    pub species_id: String,
    /// Normalized alias text.
    pub alias: String,
}

/// Domain interface for exact alias lookup.
///
/// Implementations must be fast (a few milliseconds) and side-effect free.
/// Records come back in index order; several records may share a species.
pub trait AliasIndex: Send + Sync {
    fn find_exact(&self, normalized_text: &str) -> Result<Vec<AliasRecord>, LookupError>;
}

/// Domain interface for the heavy, possibly slow, disambiguating match.
///
/// Callers bound each call with a timeout and may abandon it mid-flight,
/// so implementations must not rely on running to completion.
pub trait FuzzyMatcher: Send + Sync {
    fn match_text(
        &self,
        normalized_text: &str,
        context: &MatchContext,
    ) -> Result<MatchResult, LookupError>;
}
