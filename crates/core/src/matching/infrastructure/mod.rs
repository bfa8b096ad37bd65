pub mod fuzzy_alias_matcher;
pub mod in_memory_alias_index;
pub mod jsonl_match_logger;
pub mod log_match_logger;
