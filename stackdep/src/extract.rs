//! Extraction of training patterns from gold-standard trees.

use failure::{format_err, Fallible};
use serde_derive::Serialize;

use crate::eval::percentage;
use crate::input::InputVectorizer;
use crate::pattern::{Collector, Pattern};
use crate::sentence::Sentence;
use crate::system::{ActionSet, ArcSwapOracle, OracleError};

/// Result of extracting the patterns of one sentence.
#[derive(Debug)]
pub enum SentencePatterns {
    /// The replay reconstructed the gold tree.
    Accepted(Vec<Pattern>),

    /// The oracle found no transition sequence.
    Failed(OracleError),

    /// The replay terminated, but the arcs differ from the gold arcs.
    Imperfect,
}

/// Pattern extractor.
///
/// Replays the oracle transition sequence of each sentence and pairs the
/// feature vector of every state with the transition that the oracle
/// applies to it. Patterns of a sentence are only used when the replay
/// reproduces the gold tree exactly.
pub struct Extractor {
    oracle: ArcSwapOracle,
    vectorizer: InputVectorizer,
    actions: ActionSet,
}

impl Extractor {
    /// Construct an extractor, the oracle uses swap transitions when
    /// they are in the action vocabulary.
    pub fn new(vectorizer: InputVectorizer, actions: ActionSet) -> Self {
        Extractor {
            oracle: ArcSwapOracle::new(actions.has_swap()),
            vectorizer,
            actions,
        }
    }

    pub fn actions(&self) -> ActionSet {
        self.actions
    }

    pub fn vectorizer(&self) -> &InputVectorizer {
        &self.vectorizer
    }

    /// Extract the patterns of a sentence.
    ///
    /// Oracle failures are returned as `SentencePatterns::Failed`, all
    /// other errors are propagated.
    pub fn extract_sentence(&self, sentence: &Sentence) -> Fallible<SentencePatterns> {
        let mut patterns = Vec::new();

        let replay = self.oracle.replay(sentence, |state, transition| {
            let output = self
                .actions
                .one_hot(transition.action())
                .ok_or_else(|| format_err!("Action not in vocabulary: {}", transition.action()))?;
            patterns.push(Pattern::new(self.vectorizer.realize(state), output));
            Ok(())
        });

        let state = match replay {
            Ok(state) => state,
            Err(err) => {
                return err
                    .downcast::<OracleError>()
                    .map(SentencePatterns::Failed)
            }
        };

        if sentence.recall_precision(state.arcs()).is_perfect() {
            Ok(SentencePatterns::Accepted(patterns))
        } else {
            Ok(SentencePatterns::Imperfect)
        }
    }

    /// Extract the patterns of all sentences, accepted patterns are
    /// passed to `collector`.
    pub fn extract<C>(&self, sentences: &[Sentence], collector: &mut C) -> Fallible<ExtractSummary>
    where
        C: Collector,
    {
        let mut summary = ExtractSummary::new(self.vectorizer.input_len());

        for (idx, sentence) in sentences.iter().enumerate() {
            let patterns = self.extract_sentence(sentence)?;
            summary.add(idx, sentence, patterns, collector)?;
        }

        Ok(summary)
    }
}

/// Statistics of pattern extraction.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractSummary {
    pub n_sentences: usize,
    pub n_success: usize,
    pub n_patterns: usize,
    pub n_non_projective: usize,
    pub input_len: usize,

    /// Indices of the sentences without patterns, in corpus order.
    pub failed: Vec<usize>,
}

impl ExtractSummary {
    pub fn new(input_len: usize) -> Self {
        ExtractSummary {
            n_sentences: 0,
            n_success: 0,
            n_patterns: 0,
            n_non_projective: 0,
            input_len,
            failed: Vec::new(),
        }
    }

    /// Record the extraction result of the sentence at `idx`, passing
    /// accepted patterns to `collector`.
    pub fn add<C>(
        &mut self,
        idx: usize,
        sentence: &Sentence,
        patterns: SentencePatterns,
        collector: &mut C,
    ) -> Fallible<()>
    where
        C: Collector,
    {
        self.n_sentences += 1;

        if !sentence.is_projective() {
            self.n_non_projective += 1;
        }

        match patterns {
            SentencePatterns::Accepted(patterns) => {
                self.n_success += 1;
                self.n_patterns += patterns.len();
                for pattern in patterns {
                    collector.collect(pattern)?;
                }
            }
            SentencePatterns::Failed(_) | SentencePatterns::Imperfect => self.failed.push(idx),
        }

        Ok(())
    }

    pub fn n_failed(&self) -> usize {
        self.failed.len()
    }

    /// Percentage of sentences with patterns.
    pub fn success_rate(&self) -> f64 {
        percentage(self.n_success as f64, self.n_sentences)
    }
}
