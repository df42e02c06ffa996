pub mod context;
pub mod guards;
pub mod similarity;
pub mod tokenizer;
