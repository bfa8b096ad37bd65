use std::sync::Arc;
use std::time::Instant;

use crate::matching::domain::alias_index::{AliasIndex, AliasRecord};
use crate::matching::domain::candidate::{Candidate, CandidateSource};
use crate::matching::domain::match_context::MatchContext;
use crate::matching::domain::match_result::MatchResult;
use crate::shared::constants::{FAST_PATH_BUDGET_MS, SITE_CONFIDENCE_THRESHOLD};
use crate::shared::text_normalizer::{normalize, parse_trailing_integer};

/// Synchronous exact-match tier.
///
/// Runs on the caller's thread and either auto-accepts a hypothesis or
/// returns `None` so the caller can defer it to the slow path. Never
/// fails: lookup errors count as "no match".
pub struct FastPathMatcher {
    index: Arc<dyn AliasIndex>,
    site_confidence_threshold: f32,
}

impl FastPathMatcher {
    pub fn new(index: Arc<dyn AliasIndex>) -> Self {
        Self::with_threshold(index, SITE_CONFIDENCE_THRESHOLD)
    }

    pub fn with_threshold(index: Arc<dyn AliasIndex>, site_confidence_threshold: f32) -> Self {
        Self {
            index,
            site_confidence_threshold,
        }
    }

    pub fn try_fast_match(
        &self,
        hypothesis_text: &str,
        confidence: f32,
        context: &MatchContext,
    ) -> Option<MatchResult> {
        let (name_only, count) = parse_trailing_integer(hypothesis_text);
        let amount = count.unwrap_or(1);

        let normalized = normalize(&name_only);
        if normalized.is_empty() {
            return None;
        }

        let records = self.lookup(&normalized)?;
        let species_id = choose_species(&records, context)?;

        let is_in_tiles = context.is_tile(species_id);
        let source = if is_in_tiles {
            CandidateSource::FastTiles
        } else if context.is_site_allowed(species_id)
            && clamp_confidence(confidence) >= self.site_confidence_threshold
        {
            CandidateSource::FastSite
        } else {
            log::debug!(
                "Fast path deferring \"{hypothesis_text}\": {species_id} not accepted \
                 at confidence {confidence:.2}"
            );
            return None;
        };

        Some(MatchResult::AutoAccept {
            candidate: Candidate {
                species_id: species_id.to_string(),
                display_name: context.display_name(species_id),
                score: 1.0,
                is_in_tiles,
                source,
            },
            original_text: hypothesis_text.to_string(),
            matched_via: normalized,
            amount,
        })
    }

    fn lookup(&self, normalized: &str) -> Option<Vec<AliasRecord>> {
        let start = Instant::now();
        let result = self.index.find_exact(normalized);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if elapsed_ms > FAST_PATH_BUDGET_MS {
            log::warn!("Exact lookup for \"{normalized}\" took {elapsed_ms:.1}ms");
        }

        match result {
            Ok(records) if records.is_empty() => None,
            Ok(records) => Some(records),
            Err(e) => {
                log::warn!("Exact lookup for \"{normalized}\" failed: {e}");
                None
            }
        }
    }
}

/// Picks one species from the lookup records.
///
/// A tile species wins when several distinct species share the alias;
/// otherwise the first species in index order is used.
fn choose_species<'a>(records: &'a [AliasRecord], context: &MatchContext) -> Option<&'a str> {
    let mut distinct: Vec<&str> = Vec::new();
    for record in records {
        if !distinct.contains(&record.species_id.as_str()) {
            distinct.push(&record.species_id);
        }
    }

    if distinct.len() > 1 {
        if let Some(tile) = distinct.iter().copied().find(|id| context.is_tile(id)) {
            return Some(tile);
        }
    }
    distinct.first().copied()
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::domain::alias_index::LookupError;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ─── Stubs ───

    #[derive(Default)]
    struct StubIndex {
        aliases: HashMap<String, Vec<AliasRecord>>,
        calls: AtomicUsize,
    }

    impl StubIndex {
        fn with(mut self, alias: &str, species: &[&str]) -> Self {
            let records = species
                .iter()
                .map(|id| AliasRecord {
                    species_id: id.to_string(),
                    alias: alias.to_string(),
                })
                .collect();
            self.aliases.insert(alias.to_string(), records);
            self
        }
    }

    impl AliasIndex for StubIndex {
        fn find_exact(&self, normalized_text: &str) -> Result<Vec<AliasRecord>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .aliases
                .get(normalized_text)
                .cloned()
                .unwrap_or_default())
        }
    }

    struct FailingIndex;

    impl AliasIndex for FailingIndex {
        fn find_exact(&self, _: &str) -> Result<Vec<AliasRecord>, LookupError> {
            Err("index unavailable".into())
        }
    }

    fn context() -> MatchContext {
        MatchContext::new()
            .with_tiles(["aalscholver"])
            .with_site_allowed(["kievit", "wulp"])
            .with_species([("aalscholver", "Aalscholver"), ("kievit", "Kievit")])
    }

    fn matcher(index: StubIndex) -> (FastPathMatcher, Arc<StubIndex>) {
        let index = Arc::new(index);
        (FastPathMatcher::new(index.clone()), index)
    }

    fn accepted(result: Option<MatchResult>) -> (Candidate, u32, String) {
        match result {
            Some(MatchResult::AutoAccept {
                candidate,
                amount,
                matched_via,
                ..
            }) => (candidate, amount, matched_via),
            other => panic!("expected AutoAccept, got {other:?}"),
        }
    }

    // ─── Tests ───

    #[test]
    fn test_empty_text_returns_none_without_lookup() {
        let (fast, index) = matcher(StubIndex::default().with("aalscholver", &["aalscholver"]));
        assert!(fast.try_fast_match("  ?! ", 1.0, &context()).is_none());
        assert!(fast.try_fast_match("", 1.0, &context()).is_none());
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_count_only_utterance_is_looked_up_as_name() {
        // "5" has no separating whitespace, so it is a name, not a count
        let (fast, index) = matcher(StubIndex::default());
        assert!(fast.try_fast_match("5", 1.0, &context()).is_none());
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_alias_returns_none() {
        let (fast, _) = matcher(StubIndex::default().with("aalscholver", &["aalscholver"]));
        assert!(fast.try_fast_match("grutto", 1.0, &context()).is_none());
    }

    #[test]
    fn test_tile_species_accepted_at_low_confidence() {
        let (fast, _) = matcher(StubIndex::default().with("aalscholver", &["aalscholver"]));
        let (candidate, amount, via) =
            accepted(fast.try_fast_match("Aalscholver 5", 0.40, &context()));

        assert_eq!(candidate.species_id, "aalscholver");
        assert_eq!(candidate.display_name, "Aalscholver");
        assert_eq!(candidate.source, CandidateSource::FastTiles);
        assert!(candidate.is_in_tiles);
        assert_eq!(candidate.score, 1.0);
        assert_eq!(amount, 5);
        assert_eq!(via, "aalscholver");
    }

    #[test]
    fn test_amount_defaults_to_one() {
        let (fast, _) = matcher(StubIndex::default().with("aalscholver", &["aalscholver"]));
        let (_, amount, _) = accepted(fast.try_fast_match("aalscholver", 0.5, &context()));
        assert_eq!(amount, 1);
    }

    #[rstest]
    #[case::below_threshold(0.95, false)]
    #[case::at_threshold(0.99, true)]
    #[case::above_range_is_clamped(1.7, true)]
    #[case::negative(-0.2, false)]
    #[case::nan(f32::NAN, false)]
    fn test_site_species_requires_high_confidence(#[case] confidence: f32, #[case] accept: bool) {
        let (fast, _) = matcher(StubIndex::default().with("kievit", &["kievit"]));
        let result = fast.try_fast_match("kievit 2", confidence, &context());
        assert_eq!(result.is_some(), accept);
        if accept {
            let (candidate, amount, _) = accepted(result);
            assert_eq!(candidate.source, CandidateSource::FastSite);
            assert!(!candidate.is_in_tiles);
            assert_eq!(amount, 2);
        }
    }

    #[test]
    fn test_species_outside_tiles_and_site_is_deferred() {
        let (fast, _) = matcher(StubIndex::default().with("grutto", &["grutto"]));
        assert!(fast.try_fast_match("grutto", 1.0, &context()).is_none());
    }

    #[test]
    fn test_ambiguous_alias_prefers_tile_species() {
        let (fast, _) = matcher(
            StubIndex::default().with("scholver", &["kievit", "aalscholver", "kievit"]),
        );
        let (candidate, _, _) = accepted(fast.try_fast_match("scholver", 0.3, &context()));
        assert_eq!(candidate.species_id, "aalscholver");
    }

    #[test]
    fn test_ambiguous_alias_without_tile_takes_first_in_index_order() {
        let (fast, _) = matcher(StubIndex::default().with("steltloper", &["wulp", "kievit"]));
        let (candidate, _, _) = accepted(fast.try_fast_match("steltloper", 0.995, &context()));
        assert_eq!(candidate.species_id, "wulp");
        // No display name in the context: falls back to the id
        assert_eq!(candidate.display_name, "wulp");
    }

    #[test]
    fn test_duplicate_records_for_one_species_are_not_ambiguous() {
        let (fast, _) = matcher(StubIndex::default().with("kievit", &["kievit", "kievit"]));
        let (candidate, _, _) = accepted(fast.try_fast_match("kievit", 0.99, &context()));
        assert_eq!(candidate.species_id, "kievit");
    }

    #[test]
    fn test_lookup_error_is_treated_as_no_match() {
        let fast = FastPathMatcher::new(Arc::new(FailingIndex));
        assert!(fast.try_fast_match("aalscholver", 1.0, &context()).is_none());
    }

    #[test]
    fn test_custom_threshold() {
        let index = Arc::new(StubIndex::default().with("kievit", &["kievit"]));
        let fast = FastPathMatcher::with_threshold(index, 0.8);
        assert!(fast.try_fast_match("kievit", 0.85, &context()).is_some());
        assert!(fast.try_fast_match("kievit", 0.75, &context()).is_none());
    }
}
