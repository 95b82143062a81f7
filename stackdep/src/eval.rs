//! Evaluation of parses against gold-standard annotations.

use serde_derive::Serialize;

use crate::sentence::{RecallPrecision, Sentence};
use crate::system::{ParseOutcome, ParserState};

/// Returns `true` when the parse ended with only the root token on the
/// stack and an empty buffer.
///
/// This only checks that the parse terminated structurally, the
/// correctness of the arcs is measured by recall and precision.
pub fn completely_parsed(state: &ParserState) -> bool {
    state.stack().len() == 1 && state.buffer().is_empty() && state.stack()[0].head() == 0
}

/// Evaluation of a single sentence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SentenceEval {
    pub complete: bool,
    pub exhausted: bool,
    pub non_projective: bool,
    pub recall_precision: RecallPrecision,
}

impl SentenceEval {
    pub fn new(sentence: &Sentence, outcome: &ParseOutcome) -> Self {
        SentenceEval {
            complete: completely_parsed(&outcome.state),
            exhausted: outcome.exhausted,
            non_projective: !sentence.is_projective(),
            recall_precision: sentence.recall_precision(outcome.state.arcs()),
        }
    }

    /// The produced arcs are exactly the gold arcs.
    pub fn is_success(&self) -> bool {
        self.recall_precision.is_perfect()
    }
}

/// Aggregate statistics of the evaluation of a corpus.
///
/// Rates and averages are percentages of the number of sentences.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvalSummary {
    pub n_sentences: usize,
    pub n_success: usize,
    pub n_complete: usize,
    pub n_exhausted: usize,
    pub n_non_projective: usize,

    /// Indices of the sentences that were not parsed successfully, in
    /// sentence order.
    pub failed: Vec<usize>,

    recall_sum: f64,
    precision_sum: f64,
}

impl EvalSummary {
    pub fn new() -> Self {
        EvalSummary::default()
    }

    /// Add the evaluation of the next sentence.
    pub fn add(&mut self, eval: &SentenceEval) {
        let idx = self.n_sentences;
        self.n_sentences += 1;

        if eval.is_success() {
            self.n_success += 1;
        } else {
            self.failed.push(idx);
        }
        if eval.complete {
            self.n_complete += 1;
        }
        if eval.exhausted {
            self.n_exhausted += 1;
        }
        if eval.non_projective {
            self.n_non_projective += 1;
        }

        self.recall_sum += f64::from(eval.recall_precision.recall);
        self.precision_sum += f64::from(eval.recall_precision.precision);
    }

    pub fn success_rate(&self) -> f64 {
        percentage(self.n_success as f64, self.n_sentences)
    }

    pub fn complete_rate(&self) -> f64 {
        percentage(self.n_complete as f64, self.n_sentences)
    }

    pub fn average_recall(&self) -> f64 {
        percentage(self.recall_sum, self.n_sentences)
    }

    pub fn average_precision(&self) -> f64 {
        percentage(self.precision_sum, self.n_sentences)
    }

    /// Results in the form in which they are reported.
    pub fn results(&self) -> EvalResults {
        EvalResults {
            n_sentences: self.n_sentences,
            success_rate: self.success_rate(),
            complete_rate: self.complete_rate(),
            average_recall: self.average_recall(),
            average_precision: self.average_precision(),
            n_non_projective: self.n_non_projective,
            failed: self.failed.clone(),
        }
    }
}

/// Evaluation results.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalResults {
    pub n_sentences: usize,
    pub success_rate: f64,
    pub complete_rate: f64,
    pub average_recall: f64,
    pub average_precision: f64,
    pub n_non_projective: usize,
    pub failed: Vec<usize>,
}

/// Percentage of `n` in `total`, 0 for an empty total.
pub(crate) fn percentage(n: f64, total: usize) -> f64 {
    if total == 0 {
        0.
    } else {
        n / total as f64 * 100.
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use approx::assert_relative_eq;

    use super::{completely_parsed, EvalSummary, SentenceEval};
    use crate::sentence::tests::{non_projective_sentence, three_token_sentence};
    use crate::sentence::{Arc, Token};
    use crate::system::{ParseOutcome, ParserState};

    #[test]
    fn complete_parse_requires_single_root() {
        let root = Token::new(2, "saw", "VERB", 0);
        let other = Token::new(1, "John", "PROPN", 2);

        let state = ParserState::from_parts(vec![&root], VecDeque::new(), Vec::new());
        assert!(completely_parsed(&state));

        let state = ParserState::from_parts(vec![&root, &other], VecDeque::new(), Vec::new());
        assert!(!completely_parsed(&state));

        let state = ParserState::from_parts(vec![&root], vec![&other].into(), Vec::new());
        assert!(!completely_parsed(&state));

        let state = ParserState::from_parts(vec![&other], VecDeque::new(), Vec::new());
        assert!(!completely_parsed(&state));

        let state = ParserState::from_parts(Vec::new(), VecDeque::new(), Vec::new());
        assert!(!completely_parsed(&state));
    }

    #[test]
    fn summary_statistics() {
        let sentence = three_token_sentence();
        let root = &sentence.tokens()[1];

        let perfect = ParseOutcome {
            state: ParserState::from_parts(
                vec![root],
                VecDeque::new(),
                vec![Arc::new(2, 1), Arc::new(2, 3)],
            ),
            exhausted: false,
        };
        let half = ParseOutcome {
            state: ParserState::from_parts(
                vec![root],
                VecDeque::new(),
                vec![Arc::new(2, 1), Arc::new(1, 3)],
            ),
            exhausted: false,
        };

        let non_projective = non_projective_sentence();
        let empty = ParseOutcome {
            state: ParserState::new(&non_projective),
            exhausted: true,
        };

        let mut summary = EvalSummary::new();
        summary.add(&SentenceEval::new(&sentence, &perfect));
        summary.add(&SentenceEval::new(&sentence, &half));
        summary.add(&SentenceEval::new(&non_projective, &empty));

        assert_eq!(summary.n_sentences, 3);
        assert_eq!(summary.n_success, 1);
        assert_eq!(summary.n_complete, 2);
        assert_eq!(summary.n_exhausted, 1);
        assert_eq!(summary.n_non_projective, 1);
        assert_eq!(summary.failed, vec![1, 2]);
        assert_eq!(summary.results().failed, vec![1, 2]);

        assert_relative_eq!(summary.success_rate(), 100. / 3., epsilon = 1e-6);
        assert_relative_eq!(summary.complete_rate(), 200. / 3., epsilon = 1e-6);
        assert_relative_eq!(summary.average_recall(), 50., epsilon = 1e-6);
        assert_relative_eq!(summary.average_precision(), 50., epsilon = 1e-6);
    }

    #[test]
    fn empty_summary() {
        let results = EvalSummary::new().results();
        assert_eq!(results.n_sentences, 0);
        assert!(results.failed.is_empty());
        assert_relative_eq!(results.success_rate, 0.);
        assert_relative_eq!(results.average_recall, 0.);
    }
}
