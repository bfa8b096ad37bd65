use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::matching::domain::alias_index::{FuzzyMatcher, LookupError};
use crate::matching::domain::candidate::{Candidate, CandidateSource};
use crate::matching::domain::match_context::MatchContext;
use crate::matching::domain::match_result::{MatchResult, NoMatchReason};
use crate::matching::infrastructure::in_memory_alias_index::InMemoryAliasIndex;
use crate::matching::matcher_config::FuzzyConfig;
use crate::shared::text_normalizer::parse_trailing_integer;

/// Edit-distance matcher over the in-memory alias table.
///
/// Scores every alias of every eligible species with normalized
/// Levenshtein similarity and keeps each species' best alias. Eligible
/// means on a tile or site-allowed; with neither set populated the whole
/// table is eligible.
pub struct FuzzyAliasMatcher {
    index: Arc<InMemoryAliasIndex>,
    config: FuzzyConfig,
}

struct Scored<'a> {
    species_id: &'a str,
    alias: &'a str,
    score: f64,
    is_in_tiles: bool,
}

impl FuzzyAliasMatcher {
    pub fn new(index: Arc<InMemoryAliasIndex>, config: FuzzyConfig) -> Self {
        Self { index, config }
    }

    fn rank<'a>(&'a self, name: &str, context: &MatchContext) -> Vec<Scored<'a>> {
        let restricted =
            !context.tiles_species_ids.is_empty() || !context.site_allowed_ids.is_empty();

        let mut ranked: Vec<Scored<'a>> = Vec::new();
        let mut slot_of: HashMap<&str, usize> = HashMap::new();

        for record in self.index.records() {
            let id = record.species_id.as_str();
            let is_in_tiles = context.is_tile(id);
            if restricted && !is_in_tiles && !context.is_site_allowed(id) {
                continue;
            }

            let score = strsim::normalized_levenshtein(name, &record.alias);
            match slot_of.get(id) {
                Some(&slot) => {
                    if score > ranked[slot].score {
                        ranked[slot].score = score;
                        ranked[slot].alias = &record.alias;
                    }
                }
                None => {
                    slot_of.insert(id, ranked.len());
                    ranked.push(Scored {
                        species_id: id,
                        alias: &record.alias,
                        score,
                        is_in_tiles,
                    });
                }
            }
        }

        ranked.retain(|s| s.score >= self.config.min_score);
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.is_in_tiles.cmp(&a.is_in_tiles))
        });
        ranked
    }
}

impl FuzzyMatcher for FuzzyAliasMatcher {
    fn match_text(
        &self,
        normalized_text: &str,
        context: &MatchContext,
    ) -> Result<MatchResult, LookupError> {
        let (name, count) = parse_trailing_integer(normalized_text);
        if name.is_empty() {
            return Ok(MatchResult::no_match(normalized_text, NoMatchReason::EmptyInput));
        }

        let ranked = self.rank(&name, context);
        let Some(top) = ranked.first() else {
            return Ok(MatchResult::no_match(normalized_text, NoMatchReason::NoCandidate));
        };

        let lead = top.score - ranked.get(1).map_or(0.0, |s| s.score);
        if top.score >= self.config.accept_score
            && (ranked.len() == 1 || lead >= self.config.ambiguity_margin)
        {
            return Ok(MatchResult::AutoAccept {
                candidate: to_candidate(top, context),
                original_text: normalized_text.to_string(),
                matched_via: top.alias.to_string(),
                amount: count.unwrap_or(1),
            });
        }

        Ok(MatchResult::Ambiguous {
            original_text: normalized_text.to_string(),
            candidates: ranked
                .iter()
                .take(self.config.max_candidates)
                .map(|s| to_candidate(s, context))
                .collect(),
        })
    }
}

fn to_candidate(scored: &Scored<'_>, context: &MatchContext) -> Candidate {
    Candidate {
        species_id: scored.species_id.to_string(),
        display_name: context.display_name(scored.species_id),
        score: scored.score,
        is_in_tiles: scored.is_in_tiles,
        source: CandidateSource::Fuzzy,
    }
}
