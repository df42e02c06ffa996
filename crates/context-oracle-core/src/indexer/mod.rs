pub mod graph;
pub mod index_reader;
pub mod pagerank;
pub mod symbols;
