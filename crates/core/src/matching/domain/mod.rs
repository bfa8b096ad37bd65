pub mod alias_index;
pub mod candidate;
pub mod match_context;
pub mod match_logger;
pub mod match_result;
pub mod pending_item;
