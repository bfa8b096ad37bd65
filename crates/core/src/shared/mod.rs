pub mod constants;
pub mod ring_buffer;
pub mod text_normalizer;
