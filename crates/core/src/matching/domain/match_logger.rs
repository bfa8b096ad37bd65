use std::sync::Arc;

use super::match_result::MatchResult;

/// Fire-and-forget audit sink for match outcomes.
///
/// Implementations must swallow their own failures; a broken log
/// destination never changes what was matched.
pub trait MatchResultLogger: Send + Sync {
    fn log_match_result(
        &self,
        original_text: &str,
        result: &MatchResult,
        partials: &[String],
        asr_hypotheses: &[(String, f32)],
    );
}

/// Discards every result. Used by tests and callers without an audit trail.
pub struct NullMatchResultLogger;

impl MatchResultLogger for NullMatchResultLogger {
    fn log_match_result(&self, _: &str, _: &MatchResult, _: &[String], _: &[(String, f32)]) {}
}

/// Forwards each result to every wrapped logger in order.
pub struct CompositeMatchResultLogger {
    loggers: Vec<Arc<dyn MatchResultLogger>>,
}

impl CompositeMatchResultLogger {
    pub fn new(loggers: Vec<Arc<dyn MatchResultLogger>>) -> Self {
        Self { loggers }
    }
}

impl MatchResultLogger for CompositeMatchResultLogger {
    fn log_match_result(
        &self,
        original_text: &str,
        result: &MatchResult,
        partials: &[String],
        asr_hypotheses: &[(String, f32)],
    ) {
        for logger in &self.loggers {
            logger.log_match_result(original_text, result, partials, asr_hypotheses);
        }
    }
}
