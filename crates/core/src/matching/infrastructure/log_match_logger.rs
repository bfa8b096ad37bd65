use crate::matching::domain::match_logger::MatchResultLogger;
use crate::matching::domain::match_result::MatchResult;

/// Writes match outcomes through the `log` facade.
///
/// Accepted matches go out at `info`, everything else at `debug`.
pub struct LogMatchResultLogger;

impl MatchResultLogger for LogMatchResultLogger {
    fn log_match_result(
        &self,
        original_text: &str,
        result: &MatchResult,
        partials: &[String],
        asr_hypotheses: &[(String, f32)],
    ) {
        let confidence = asr_hypotheses
            .first()
            .map(|(_, c)| format!("{c:.2}"))
            .unwrap_or_else(|| "-".to_string());

        match result {
            MatchResult::AutoAccept { .. } => {
                log::info!("\"{original_text}\" (confidence {confidence}) -> {result}");
            }
            MatchResult::NoMatch { .. } | MatchResult::Ambiguous { .. } => {
                log::debug!(
                    "\"{original_text}\" (confidence {confidence}, {} partials) -> {result}",
                    partials.len()
                );
            }
        }
    }
}
