use failure::{Fallible, ResultExt};

use crate::model::FeedForward;
use crate::sentence::Sentence;
use crate::system::{Action, GreedyParser, ParseOutcome, ParserState};
use crate::vocab::Vocabularies;
use crate::wrapper::Config;

/// A convenience wrapper for `GreedyParser`.
///
/// This wrapper loads the vocabularies and embeddings, initializes the
/// vectorizer, and loads the network parameters given a `Config`
/// struct.
pub struct Parser {
    inner: GreedyParser<FeedForward>,
    vocabs: Vocabularies,
}

impl Parser {
    /// Create a parser from the given configuration.
    pub fn new(config: &Config) -> Fallible<Self> {
        let vocabs = config
            .vocab
            .load()
            .with_context(|e| format!("Cannot load vocabularies: {}", e))?;
        let vectorizer = config
            .vectorizer(&vocabs)
            .with_context(|e| format!("Cannot construct vectorizer: {}", e))?;
        let network = config.model.load_network()?;

        let inner = GreedyParser::new(network, vectorizer, config.system.actions())
            .with_context(|e| format!("Cannot construct parser: {}", e))?;

        Ok(Parser { inner, vocabs })
    }

    pub fn vocabs(&self) -> &Vocabularies {
        &self.vocabs
    }

    /// Parse a sentence.
    pub fn parse<'a>(&self, sentence: &'a Sentence) -> Fallible<ParseOutcome<'a>> {
        self.inner.parse(sentence)
    }

    /// Parse a sentence, calling `trace` after every step.
    pub fn parse_traced<'a, F>(
        &self,
        sentence: &'a Sentence,
        trace: F,
    ) -> Fallible<ParseOutcome<'a>>
    where
        F: FnMut(&ParserState<'a>, Action),
    {
        self.inner.parse_traced(sentence, trace)
    }
}
