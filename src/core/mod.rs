pub mod charset;
pub mod dataset;
pub mod engine;
pub mod mapping;
pub mod rephraser;
pub mod resolver;
pub mod segmenter;
pub mod trie;
pub mod types;
