/// Pending hypotheses kept for the slow path before the oldest is overwritten.
pub const PENDING_CAPACITY: usize = 8;

/// Upper bound on one heavy match attempt.
pub const MATCH_TIMEOUT_MS: u64 = 1200;

/// Worker sleep between polls of an empty pending queue.
pub const POLL_INTERVAL_MS: u64 = 50;

/// Timed-out items are re-queued at most this many times.
pub const MAX_RETRIES: u32 = 1;

/// Largest accepted `max_retries` in a config file.
pub const MAX_RETRIES_LIMIT: u32 = 16;

/// Minimum ASR confidence to auto-accept a species that is site-allowed but not on a tile.
pub const SITE_CONFIDENCE_THRESHOLD: f32 = 0.99;

/// Exact lookups slower than this are reported.
pub const FAST_PATH_BUDGET_MS: f64 = 5.0;

pub const FUZZY_MIN_SCORE: f64 = 0.75;
pub const FUZZY_ACCEPT_SCORE: f64 = 0.88;
pub const FUZZY_AMBIGUITY_MARGIN: f64 = 0.05;
pub const FUZZY_MAX_CANDIDATES: usize = 5;

pub const CONFIG_DIR_NAME: &str = "FieldCount";
pub const CONFIG_FILE_NAME: &str = "matcher.json";
