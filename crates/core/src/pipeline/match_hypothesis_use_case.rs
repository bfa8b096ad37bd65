use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::matching::domain::match_context::MatchContext;
use crate::matching::domain::match_logger::MatchResultLogger;
use crate::matching::domain::match_result::MatchResult;
use crate::matching::domain::pending_item::PendingId;
use crate::matching::fast_path_matcher::FastPathMatcher;
use crate::matching::pending_match_buffer::PendingMatchBuffer;

/// What happened to a submitted hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Resolved synchronously by the fast path.
    Accepted(MatchResult),
    /// Handed to the slow path; the result arrives through the listener.
    Deferred(PendingId),
    /// Refused by the pending buffer.
    Dropped,
}

/// Final-hypothesis matching: fast path → pending buffer.
pub struct MatchHypothesisUseCase {
    fast_path: FastPathMatcher,
    pending: PendingMatchBuffer,
    logger: Arc<dyn MatchResultLogger>,
}

impl MatchHypothesisUseCase {
    pub fn new(
        fast_path: FastPathMatcher,
        pending: PendingMatchBuffer,
        logger: Arc<dyn MatchResultLogger>,
    ) -> Self {
        Self {
            fast_path,
            pending,
            logger,
        }
    }

    pub fn submit(
        &self,
        text: &str,
        confidence: f32,
        context: &Arc<MatchContext>,
        partials: Vec<String>,
    ) -> Submission {
        if let Some(result) = self.fast_path.try_fast_match(text, confidence, context) {
            let hypotheses = [(text.to_string(), confidence)];
            let logged = panic::catch_unwind(AssertUnwindSafe(|| {
                self.logger
                    .log_match_result(text, &result, &partials, &hypotheses)
            }));
            if logged.is_err() {
                log::error!("Result logger failed for fast-path match of \"{text}\"");
            }
            return Submission::Accepted(result);
        }

        match self
            .pending
            .enqueue_pending(text, confidence, Arc::clone(context), partials)
        {
            Some(id) => Submission::Deferred(id),
            None => {
                log::warn!("Hypothesis \"{text}\" dropped: pending buffer refused it");
                Submission::Dropped
            }
        }
    }

    /// The slow-path buffer, for installing listeners and shutting down.
    pub fn pending(&self) -> &PendingMatchBuffer {
        &self.pending
    }

    pub fn shutdown(&self) {
        self.pending.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::domain::alias_index::{AliasIndex, AliasRecord, FuzzyMatcher, LookupError};
    use crate::matching::domain::match_logger::NullMatchResultLogger;
    use crate::matching::domain::match_result::NoMatchReason;
    use crate::matching::matcher_config::MatcherConfig;
    use crate::shared::ring_buffer::OverflowPolicy;
    use crossbeam_channel::{Receiver, Sender};
    use std::sync::Mutex;
    use std::time::Duration;

    // ─── Stubs ───

    struct StubIndex;

    impl AliasIndex for StubIndex {
        fn find_exact(&self, normalized_text: &str) -> Result<Vec<AliasRecord>, LookupError> {
            if normalized_text == "aalscholver" {
                Ok(vec![AliasRecord {
                    species_id: "aalscholver".to_string(),
                    alias: "aalscholver".to_string(),
                }])
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct EchoMatcher;

    impl FuzzyMatcher for EchoMatcher {
        fn match_text(
            &self,
            normalized: &str,
            _: &MatchContext,
        ) -> Result<MatchResult, LookupError> {
            Ok(MatchResult::no_match(normalized, NoMatchReason::NoCandidate))
        }
    }

    /// Blocks every call until the gate sender is dropped.
    struct GatedMatcher {
        gate: Receiver<()>,
    }

    impl FuzzyMatcher for GatedMatcher {
        fn match_text(
            &self,
            normalized: &str,
            _: &MatchContext,
        ) -> Result<MatchResult, LookupError> {
            let _ = self.gate.recv();
            Ok(MatchResult::no_match(normalized, NoMatchReason::NoCandidate))
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        entries: Mutex<Vec<(String, MatchResult, Vec<String>)>>,
    }

    impl MatchResultLogger for RecordingLogger {
        fn log_match_result(
            &self,
            original_text: &str,
            result: &MatchResult,
            partials: &[String],
            _: &[(String, f32)],
        ) {
            self.entries.lock().unwrap().push((
                original_text.to_string(),
                result.clone(),
                partials.to_vec(),
            ));
        }
    }

    struct PanickingLogger;

    impl MatchResultLogger for PanickingLogger {
        fn log_match_result(&self, _: &str, _: &MatchResult, _: &[String], _: &[(String, f32)]) {
            panic!("audit sink unavailable");
        }
    }

    fn context() -> Arc<MatchContext> {
        Arc::new(MatchContext::new().with_tiles(["aalscholver"]))
    }

    fn use_case(
        matcher: Arc<dyn FuzzyMatcher>,
        logger: Arc<dyn MatchResultLogger>,
        config: &MatcherConfig,
    ) -> MatchHypothesisUseCase {
        let pending = PendingMatchBuffer::new(matcher, Arc::clone(&logger), config).unwrap();
        MatchHypothesisUseCase::new(FastPathMatcher::new(Arc::new(StubIndex)), pending, logger)
    }

    // ─── Tests ───

    #[test]
    fn test_fast_path_accept_is_logged_and_not_queued() {
        let logger = Arc::new(RecordingLogger::default());
        let uc = use_case(Arc::new(EchoMatcher), logger.clone(), &MatcherConfig::default());

        let submission = uc.submit("aalscholver 3", 0.2, &context(), vec!["aal".to_string()]);

        match submission {
            Submission::Accepted(MatchResult::AutoAccept { amount, .. }) => assert_eq!(amount, 3),
            other => panic!("expected fast-path accept, got {other:?}"),
        }
        assert!(!uc.pending().is_running());
        let entries = logger.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "aalscholver 3");
        assert_eq!(entries[0].2, vec!["aal".to_string()]);
    }

    #[test]
    fn test_panicking_logger_does_not_change_fast_path_result() {
        let uc = use_case(
            Arc::new(EchoMatcher),
            Arc::new(PanickingLogger),
            &MatcherConfig::default(),
        );
        assert!(matches!(
            uc.submit("aalscholver", 0.1, &context(), Vec::new()),
            Submission::Accepted(MatchResult::AutoAccept { .. })
        ));
    }

    #[test]
    fn test_fast_path_miss_is_deferred_and_delivered() {
        let uc = use_case(
            Arc::new(EchoMatcher),
            Arc::new(NullMatchResultLogger),
            &MatcherConfig::default(),
        );
        let (tx, rx) = crossbeam_channel::unbounded();
        uc.pending()
            .set_result_listener(Arc::new(move |id: PendingId, result: &MatchResult| {
                let _ = tx.send((id, result.clone()));
            }));

        let Submission::Deferred(id) = uc.submit("Grutto", 0.9, &context(), Vec::new()) else {
            panic!("expected deferral");
        };

        let (delivered_id, result) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(delivered_id, id);
        assert_eq!(
            result,
            MatchResult::no_match("grutto", NoMatchReason::NoCandidate)
        );
        uc.shutdown();
    }

    #[test]
    fn test_full_queue_under_reject_policy_drops() {
        let config = MatcherConfig {
            pending_capacity: 1,
            overflow_policy: OverflowPolicy::Reject,
            ..MatcherConfig::default()
        };
        let (gate_tx, gate_rx): (Sender<()>, Receiver<()>) = crossbeam_channel::bounded(0);
        let uc = use_case(
            Arc::new(GatedMatcher { gate: gate_rx }),
            Arc::new(NullMatchResultLogger),
            &config,
        );

        // First item is taken by the worker and blocks inside the matcher
        assert!(matches!(
            uc.submit("grutto", 0.9, &context(), Vec::new()),
            Submission::Deferred(_)
        ));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while uc.pending().queued_len() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(matches!(
            uc.submit("wulp", 0.9, &context(), Vec::new()),
            Submission::Deferred(_)
        ));
        assert_eq!(uc.submit("kievit", 0.9, &context(), Vec::new()), Submission::Dropped);

        drop(gate_tx);
        uc.shutdown();
    }

    #[test]
    fn test_submit_after_shutdown_is_dropped() {
        let uc = use_case(
            Arc::new(EchoMatcher),
            Arc::new(NullMatchResultLogger),
            &MatcherConfig::default(),
        );
        uc.shutdown();
        assert_eq!(uc.submit("grutto", 0.9, &context(), Vec::new()), Submission::Dropped);
    }

    #[test]
    fn test_fast_path_still_answers_after_shutdown() {
        let uc = use_case(
            Arc::new(EchoMatcher),
            Arc::new(NullMatchResultLogger),
            &MatcherConfig::default(),
        );
        uc.shutdown();
        assert!(matches!(
            uc.submit("aalscholver", 0.1, &context(), Vec::new()),
            Submission::Accepted(_)
        ));
    }
}
