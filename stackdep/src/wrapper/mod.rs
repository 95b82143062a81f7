//! High-level wrappers.
//!
//! `Parser` sets up a `GreedyParser` from a `Config`, loading the
//! vocabularies, embeddings and network parameters that the
//! configuration refers to.

mod config;
pub use config::{
    Config, ConfigError, Embedding, EmbeddingAlloc, HiddenLayer, Input, Model, System, TomlRead,
    VocabFiles, WordEncoding,
};

mod parser;
pub use parser::Parser;
