use std::cmp::{max, min};
use std::collections::HashSet;
use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// A token with its gold-standard annotation.
///
/// Token identifiers are 1-based positions in the sentence. A head of
/// `0` marks the root of the sentence.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Token {
    id: usize,
    form: String,
    lemma: String,
    upostag: String,
    head: usize,
    deprel: String,
}

impl Token {
    /// Construct a token without lemma and dependency relation.
    pub fn new(
        id: usize,
        form: impl Into<String>,
        upostag: impl Into<String>,
        head: usize,
    ) -> Self {
        Token {
            id,
            form: form.into(),
            lemma: "_".to_owned(),
            upostag: upostag.into(),
            head,
            deprel: "_".to_owned(),
        }
    }

    pub fn with_lemma(mut self, lemma: impl Into<String>) -> Self {
        self.lemma = lemma.into();
        self
    }

    pub fn with_deprel(mut self, deprel: impl Into<String>) -> Self {
        self.deprel = deprel.into();
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn form(&self) -> &str {
        &self.form
    }

    pub fn lemma(&self) -> &str {
        &self.lemma
    }

    pub fn upostag(&self) -> &str {
        &self.upostag
    }

    /// Gold head of the token, `0` for the root.
    pub fn head(&self) -> usize {
        self.head
    }

    pub fn deprel(&self) -> &str {
        &self.deprel
    }

    pub fn is_root(&self) -> bool {
        self.head == 0
    }
}

/// A dependency arc.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Arc {
    pub head: usize,
    pub dependent: usize,
}

impl Arc {
    pub fn new(head: usize, dependent: usize) -> Self {
        Arc { head, dependent }
    }

    /// The span covered by the arc as `(left, right)`.
    pub fn span(&self) -> (usize, usize) {
        (
            min(self.head, self.dependent),
            max(self.head, self.dependent),
        )
    }
}

impl fmt::Display for Arc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.head, self.dependent)
    }
}

/// Returns `true` when two spans overlap without one containing the
/// other.
pub(crate) fn spans_cross((a1, b1): (usize, usize), (a2, b2): (usize, usize)) -> bool {
    (a1 < a2 && a2 < b1 && b1 < b2) || (a2 < a1 && a1 < b2 && b2 < b1)
}

/// Returns `true` when the two arcs cross.
///
/// Arcs that share an endpoint or that are nested never cross.
pub fn arcs_cross(arc1: &Arc, arc2: &Arc) -> bool {
    spans_cross(arc1.span(), arc2.span())
}

/// Recall and precision of a set of produced arcs.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct RecallPrecision {
    pub recall: f32,
    pub precision: f32,
}

impl RecallPrecision {
    /// Compute recall and precision of `produced` against `gold`.
    ///
    /// When either set of arcs is empty, recall and precision are both 0.
    pub fn compute(gold: &[Arc], produced: &[Arc]) -> Self {
        if gold.is_empty() || produced.is_empty() {
            return RecallPrecision {
                recall: 0.,
                precision: 0.,
            };
        }

        let gold: HashSet<_> = gold.iter().collect();
        let correct = produced.iter().filter(|arc| gold.contains(arc)).count();

        RecallPrecision {
            recall: correct as f32 / gold.len() as f32,
            precision: correct as f32 / produced.len() as f32,
        }
    }

    /// Both recall and precision are 1.
    pub fn is_perfect(&self) -> bool {
        self.recall == 1. && self.precision == 1.
    }
}

/// A sentence with gold-standard dependency annotation.
///
/// The gold arcs are extracted once on construction, sentences are
/// immutable afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sentence {
    tokens: Vec<Token>,
    arcs: Vec<Arc>,
}

impl Sentence {
    pub fn new(tokens: Vec<Token>) -> Self {
        let arcs = tokens
            .iter()
            .filter(|token| !token.is_root())
            .map(|token| Arc::new(token.head(), token.id()))
            .collect();

        Sentence { tokens, arcs }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Gold arcs, one for every token that is not the root.
    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    /// Find a pair of crossing gold arcs.
    ///
    /// Returns `None` when the sentence is projective.
    pub fn crossing_arcs(&self) -> Option<(Arc, Arc)> {
        for (idx, arc1) in self.arcs.iter().enumerate() {
            for arc2 in &self.arcs[idx + 1..] {
                if arcs_cross(arc1, arc2) {
                    return Some((*arc1, *arc2));
                }
            }
        }

        None
    }

    pub fn is_projective(&self) -> bool {
        self.crossing_arcs().is_none()
    }

    /// Recall and precision of `produced` against the gold arcs.
    pub fn recall_precision(&self, produced: &[Arc]) -> RecallPrecision {
        RecallPrecision::compute(&self.arcs, produced)
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut forms = self.tokens.iter().map(Token::form);
        if let Some(form) = forms.next() {
            f.write_str(form)?;
        }
        for form in forms {
            write!(f, " {}", form)?;
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use approx::assert_relative_eq;

    use super::{arcs_cross, Arc, RecallPrecision, Sentence, Token};

    /// "John saw Mary": token 2 governs tokens 1 and 3.
    pub(crate) fn three_token_sentence() -> Sentence {
        Sentence::new(vec![
            Token::new(1, "John", "PROPN", 2),
            Token::new(2, "saw", "VERB", 0),
            Token::new(3, "Mary", "PROPN", 2),
        ])
    }

    /// Non-projective: arcs 3 -> 1 and 5 -> 2 cross.
    pub(crate) fn non_projective_sentence() -> Sentence {
        Sentence::new(vec![
            Token::new(1, "A", "DET", 3),
            Token::new(2, "hearing", "NOUN", 5),
            Token::new(3, "is", "AUX", 0),
            Token::new(4, "scheduled", "VERB", 3),
            Token::new(5, "today", "NOUN", 4),
        ])
    }

    #[test]
    fn arcs_skip_root() {
        let sentence = three_token_sentence();
        assert_eq!(sentence.arcs(), &[Arc::new(2, 1), Arc::new(2, 3)]);
    }

    #[test]
    fn crossing_is_symmetric() {
        let arcs = [
            Arc::new(3, 1),
            Arc::new(5, 2),
            Arc::new(2, 4),
            Arc::new(1, 4),
            Arc::new(4, 3),
            Arc::new(6, 1),
        ];

        for a in &arcs {
            for b in &arcs {
                assert_eq!(arcs_cross(a, b), arcs_cross(b, a));
            }
        }
    }

    #[test]
    fn shared_endpoints_and_nesting_do_not_cross() {
        let arc = Arc::new(1, 4);
        assert!(!arcs_cross(&arc, &arc));
        assert!(!arcs_cross(&arc, &Arc::new(4, 2)));
        assert!(!arcs_cross(&arc, &Arc::new(1, 3)));
        assert!(!arcs_cross(&arc, &Arc::new(2, 3)));
        assert!(!arcs_cross(&arc, &Arc::new(4, 6)));
        assert!(arcs_cross(&arc, &Arc::new(3, 6)));
        assert!(arcs_cross(&Arc::new(6, 3), &arc));
    }

    #[test]
    fn detects_non_projectivity() {
        assert!(three_token_sentence().is_projective());

        let sentence = non_projective_sentence();
        assert_eq!(
            sentence.crossing_arcs(),
            Some((Arc::new(3, 1), Arc::new(5, 2)))
        );
    }

    #[test]
    fn recall_precision_empty_sets() {
        let gold = [Arc::new(2, 1)];
        assert_eq!(
            RecallPrecision::compute(&[], &gold),
            RecallPrecision {
                recall: 0.,
                precision: 0.
            }
        );
        assert_eq!(
            RecallPrecision::compute(&gold, &[]),
            RecallPrecision {
                recall: 0.,
                precision: 0.
            }
        );
    }

    #[test]
    fn recall_precision_partial() {
        let sentence = non_projective_sentence();
        let result = sentence.recall_precision(&[Arc::new(3, 1), Arc::new(2, 5)]);
        assert_relative_eq!(result.recall, 0.25);
        assert_relative_eq!(result.precision, 0.5);
        assert!(!result.is_perfect());

        assert!(sentence.recall_precision(sentence.arcs()).is_perfect());
    }
}
