pub mod corpus;
pub use crate::corpus::Corpus;

mod eval;
pub use crate::eval::{completely_parsed, EvalResults, EvalSummary, SentenceEval};

mod extract;
pub use crate::extract::{ExtractSummary, Extractor, SentencePatterns};

mod input;
pub use crate::input::{
    hash_word, Embeddings, FeatureDepth, InputError, InputVectorizer, WordEncoder,
};

pub mod model;

mod pattern;
pub use crate::pattern::{
    Collector, NoopCollector, Pattern, PatternError, PatternReader, PatternSet, PatternWriter,
};

mod sentence;
pub use crate::sentence::{arcs_cross, Arc, RecallPrecision, Sentence, Token};

pub mod serialization;

pub mod system;

mod vocab;
pub use crate::vocab::{Vocab, VocabError, Vocabularies, NULL};

pub mod wrapper;
