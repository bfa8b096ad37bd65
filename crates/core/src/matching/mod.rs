pub mod domain;
pub mod fast_path_matcher;
pub mod infrastructure;
pub mod matcher_config;
pub mod pending_match_buffer;
