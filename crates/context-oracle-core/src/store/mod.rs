pub mod embeddings;
pub mod inflight;
pub mod schema;
