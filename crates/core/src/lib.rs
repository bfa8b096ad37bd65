pub mod matching;
pub mod pipeline;
pub mod shared;
