use failure::{ensure, Fallible};

use crate::input::InputVectorizer;
use crate::model::Classifier;
use crate::sentence::Sentence;

use super::{Action, ActionSet, ParserState, TransitionError};

/// Result of parsing a sentence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseOutcome<'a> {
    /// The final parser state.
    pub state: ParserState<'a>,

    /// `true` when the parse stopped because none of the actions could
    /// be applied. The state is then not terminal.
    pub exhausted: bool,
}

/// Greedy transition-based parser.
///
/// In every state, the actions are tried in the order of their
/// classifier scores until one can be applied. Attachments are made
/// purely by stack position, the gold heads of tokens are not used.
pub struct GreedyParser<C> {
    classifier: C,
    vectorizer: InputVectorizer,
    actions: ActionSet,
}

impl<C> GreedyParser<C>
where
    C: Classifier,
{
    /// Construct a parser.
    ///
    /// The classifier must accept the feature vectors of `vectorizer`
    /// and return a score for every action in `actions`.
    pub fn new(classifier: C, vectorizer: InputVectorizer, actions: ActionSet) -> Fallible<Self> {
        ensure!(
            classifier.n_inputs() == vectorizer.input_len(),
            "Classifier expects {} inputs, feature vectors have length {}",
            classifier.n_inputs(),
            vectorizer.input_len()
        );
        ensure!(
            classifier.n_outputs() == actions.len(),
            "Classifier has {} outputs, the transition system has {} actions",
            classifier.n_outputs(),
            actions.len()
        );

        Ok(GreedyParser {
            classifier,
            vectorizer,
            actions,
        })
    }

    pub fn actions(&self) -> ActionSet {
        self.actions
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn vectorizer(&self) -> &InputVectorizer {
        &self.vectorizer
    }

    /// Parse a sentence.
    pub fn parse<'a>(&self, sentence: &'a Sentence) -> Fallible<ParseOutcome<'a>> {
        self.parse_traced(sentence, |_, _| ())
    }

    /// Parse a sentence, calling `trace` after every step with the
    /// resulting state and the action that led to it.
    pub fn parse_traced<'a, F>(
        &self,
        sentence: &'a Sentence,
        mut trace: F,
    ) -> Fallible<ParseOutcome<'a>>
    where
        F: FnMut(&ParserState<'a>, Action),
    {
        let mut state = ParserState::new(sentence);
        let mut input = vec![0.; self.vectorizer.input_len()];

        while !state.is_terminal() {
            if state.stack().len() < 2 {
                state.shift()?;
                trace(&state, Action::Shift);
                continue;
            }

            self.vectorizer.realize_into(&state, &mut input)?;
            let scores = self.classifier.predict(&input)?;

            match self.apply_best(&mut state, &scores)? {
                Some(action) => trace(&state, action),
                None => {
                    return Ok(ParseOutcome {
                        state,
                        exhausted: true,
                    })
                }
            }
        }

        Ok(ParseOutcome {
            state,
            exhausted: false,
        })
    }

    /// Apply the best-scoring applicable action.
    ///
    /// Returns `None` when no action can be applied, the state is
    /// unchanged in that case.
    fn apply_best(&self, state: &mut ParserState, scores: &[f32]) -> Fallible<Option<Action>> {
        for action in self.actions.rank(scores)? {
            if try_action(state, action).is_ok() {
                return Ok(Some(action));
            }
        }

        Ok(None)
    }
}

fn try_action(state: &mut ParserState, action: Action) -> Result<(), TransitionError> {
    match action {
        Action::Shift => state.shift(),
        Action::LeftArc => state.left_arc(),
        Action::RightArc => state.right_arc(),
        Action::Swap => Err(TransitionError::SwapUnsupported),
    }
}
