use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::matching::domain::match_logger::MatchResultLogger;
use crate::matching::domain::match_result::MatchResult;

#[derive(Serialize)]
struct AsrHypothesis<'a> {
    text: &'a str,
    confidence: f32,
}

#[derive(Serialize)]
struct AuditLine<'a> {
    logged_at_ms: u128,
    original_text: &'a str,
    result: &'a MatchResult,
    partials: &'a [String],
    asr_hypotheses: Vec<AsrHypothesis<'a>>,
}

/// Append-only audit trail, one JSON object per line.
///
/// Write failures are reported through `log::warn!` and otherwise ignored.
pub struct JsonlMatchResultLogger {
    file: Mutex<File>,
}

impl JsonlMatchResultLogger {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn write_line(&self, line: &AuditLine<'_>) -> Result<(), Box<dyn std::error::Error>> {
        let mut json = serde_json::to_string(line)?;
        json.push('\n');
        let mut file = self.file.lock().map_err(|_| "audit file lock poisoned")?;
        file.write_all(json.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

impl MatchResultLogger for JsonlMatchResultLogger {
    fn log_match_result(
        &self,
        original_text: &str,
        result: &MatchResult,
        partials: &[String],
        asr_hypotheses: &[(String, f32)],
    ) {
        let line = AuditLine {
            logged_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0),
            original_text,
            result,
            partials,
            asr_hypotheses: asr_hypotheses
                .iter()
                .map(|(text, confidence)| AsrHypothesis {
                    text,
                    confidence: *confidence,
                })
                .collect(),
        };

        if let Err(e) = self.write_line(&line) {
            log::warn!("Failed to write match audit line: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::domain::match_result::NoMatchReason;

    #[test]
    fn test_appends_one_json_object_per_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let logger = JsonlMatchResultLogger::open(&path).unwrap();

        let timed_out = MatchResult::no_match("kievit", NoMatchReason::PendingTimedOut);
        let unknown = MatchResult::no_match("wulp", NoMatchReason::NoCandidate);
        let partials = ["kie".to_string()];
        let hypotheses = [("kievit".to_string(), 0.5)];
        logger.log_match_result("kievit", &timed_out, &partials, &hypotheses);
        logger.log_match_result("wulp", &unknown, &[], &[]);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["original_text"], "kievit");
        assert_eq!(lines[0]["result"]["reason"], "pending_timed_out");
        assert_eq!(lines[0]["partials"][0], "kie");
        assert_eq!(lines[0]["asr_hypotheses"][0]["text"], "kievit");
        assert_eq!(lines[1]["result"]["kind"], "no_match");
    }

    #[test]
    fn test_reopen_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let result = MatchResult::no_match("wulp", NoMatchReason::NoCandidate);

        JsonlMatchResultLogger::open(&path)
            .unwrap()
            .log_match_result("wulp", &result, &[], &[]);
        JsonlMatchResultLogger::open(&path)
            .unwrap()
            .log_match_result("wulp", &result, &[], &[]);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        assert!(JsonlMatchResultLogger::open(Path::new("/nonexistent/dir/audit.jsonl")).is_err());
    }
}
