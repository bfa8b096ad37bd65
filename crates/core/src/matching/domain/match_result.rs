use serde::Serialize;

use super::candidate::Candidate;

/// Why a hypothesis ended without an accepted species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    /// Heavy matching timed out on every attempt.
    PendingTimedOut,
    /// Nothing in the alias index scored high enough.
    NoCandidate,
    /// Normalization left nothing to look up.
    EmptyInput,
    /// The alias index or heavy matcher returned an error.
    LookupFailed,
}

impl NoMatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoMatchReason::PendingTimedOut => "pending_timed_out",
            NoMatchReason::NoCandidate => "no_candidate",
            NoMatchReason::EmptyInput => "empty_input",
            NoMatchReason::LookupFailed => "lookup_failed",
        }
    }
}

impl std::fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of matching one hypothesis. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchResult {
    AutoAccept {
        candidate: Candidate,
        original_text: String,
        /// Normalized alias text that produced the match.
        matched_via: String,
        amount: u32,
    },
    NoMatch {
        original_text: String,
        reason: NoMatchReason,
    },
    Ambiguous {
        original_text: String,
        candidates: Vec<Candidate>,
    },
}

impl MatchResult {
    pub fn no_match(original_text: impl Into<String>, reason: NoMatchReason) -> Self {
        MatchResult::NoMatch {
            original_text: original_text.into(),
            reason,
        }
    }

    pub fn original_text(&self) -> &str {
        match self {
            MatchResult::AutoAccept { original_text, .. }
            | MatchResult::NoMatch { original_text, .. }
            | MatchResult::Ambiguous { original_text, .. } => original_text,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, MatchResult::AutoAccept { .. })
    }

    /// Short tag for logs: `auto_accept`, `no_match`, `ambiguous`.
    pub fn kind(&self) -> &'static str {
        match self {
            MatchResult::AutoAccept { .. } => "auto_accept",
            MatchResult::NoMatch { .. } => "no_match",
            MatchResult::Ambiguous { .. } => "ambiguous",
        }
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchResult::AutoAccept {
                candidate, amount, ..
            } => write!(
                f,
                "{} x{} ({}, score {:.2})",
                candidate.display_name, amount, candidate.source, candidate.score
            ),
            MatchResult::NoMatch {
                original_text,
                reason,
            } => write!(f, "no match for \"{original_text}\" ({reason})"),
            MatchResult::Ambiguous { candidates, .. } => {
                let names: Vec<&str> = candidates
                    .iter()
                    .map(|c| c.display_name.as_str())
                    .collect();
                write!(f, "ambiguous: {}", names.join(" / "))
            }
        }
    }
}
