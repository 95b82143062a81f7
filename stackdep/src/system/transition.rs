use std::fmt;

use failure::{ensure, Fail, Fallible};
use ordered_float::OrderedFloat;
use serde_derive::{Deserialize, Serialize};

use super::ParserState;

/// Errors raised when a transition is not applicable.
#[derive(Clone, Copy, Debug, Eq, Fail, PartialEq)]
pub enum TransitionError {
    #[fail(display = "cannot shift, the buffer is empty")]
    EmptyBuffer,

    #[fail(display = "cannot attach, the stack has fewer than two tokens")]
    StackTooSmall,

    #[fail(display = "swap indices out of bounds: {}", _0)]
    SwapOutOfBounds(SwapIndices),

    #[fail(display = "swap is not supported by the greedy parser")]
    SwapUnsupported,
}

/// Stack and buffer positions that are exchanged by a swap.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SwapIndices {
    /// Index into the stack, counted from the bottom.
    pub stack: usize,

    /// Index into the buffer, counted from the front.
    pub buffer: usize,
}

impl fmt::Display for SwapIndices {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "stack {} <-> buffer {}", self.stack, self.buffer)
    }
}

/// Actions of the transition system.
///
/// The declaration order is the order of the action vocabulary.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Shift,
    LeftArc,
    RightArc,
    Swap,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Shift => "shift",
            Action::LeftArc => "leftArc",
            Action::RightArc => "rightArc",
            Action::Swap => "swap",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully specified transition.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Transition {
    /// Move the buffer front onto the stack.
    Shift,

    /// Pop the stack top and attach it to the token below it.
    LeftArc,

    /// Remove the token below the stack top and attach it to the top.
    RightArc,

    /// Exchange a stack token with a buffer token.
    Swap(SwapIndices),
}

impl Transition {
    pub fn action(&self) -> Action {
        match self {
            Transition::Shift => Action::Shift,
            Transition::LeftArc => Action::LeftArc,
            Transition::RightArc => Action::RightArc,
            Transition::Swap(_) => Action::Swap,
        }
    }

    /// Apply the transition to a copy of `state`.
    ///
    /// `state` itself is never modified, also not when the transition
    /// is not applicable.
    pub fn apply<'a>(&self, state: &ParserState<'a>) -> Result<ParserState<'a>, TransitionError> {
        let mut next = state.clone();
        self.apply_mut(&mut next)?;
        Ok(next)
    }

    /// Apply the transition in place.
    ///
    /// The preconditions are checked before `state` is touched, so the
    /// state is unchanged when an error is returned.
    pub fn apply_mut(&self, state: &mut ParserState) -> Result<(), TransitionError> {
        match *self {
            Transition::Shift => state.shift(),
            Transition::LeftArc => state.left_arc(),
            Transition::RightArc => state.right_arc(),
            Transition::Swap(indices) => state.swap(indices),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Transition::Swap(indices) => write!(f, "swap ({})", indices),
            transition => f.write_str(transition.action().name()),
        }
    }
}

/// The action vocabulary of a transition system.
///
/// The vocabulary always contains shift, left-arc, and right-arc. Swap
/// is optional.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ActionSet {
    swap: bool,
}

static ACTIONS: [Action; 4] = [Action::Shift, Action::LeftArc, Action::RightArc, Action::Swap];

impl ActionSet {
    pub fn new(swap: bool) -> Self {
        ActionSet { swap }
    }

    pub fn has_swap(&self) -> bool {
        self.swap
    }

    pub fn len(&self) -> usize {
        self.actions().len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Actions in vocabulary order.
    pub fn actions(&self) -> &'static [Action] {
        if self.swap {
            &ACTIONS
        } else {
            &ACTIONS[..3]
        }
    }

    /// Vocabulary index of an action.
    pub fn index(&self, action: Action) -> Option<usize> {
        self.actions().iter().position(|&a| a == action)
    }

    /// One-hot encoding of an action, `None` if the action is not in
    /// the vocabulary.
    pub fn one_hot(&self, action: Action) -> Option<Vec<f32>> {
        let index = self.index(action)?;
        let mut encoding = vec![0.; self.len()];
        encoding[index] = 1.;
        Some(encoding)
    }

    /// Rank the actions by their scores, best first.
    ///
    /// Actions with equal scores keep vocabulary order.
    pub fn rank(&self, scores: &[f32]) -> Fallible<Vec<Action>> {
        ensure!(
            scores.len() == self.len(),
            "Number of scores ({}) and actions ({}) differ",
            scores.len(),
            self.len()
        );

        let mut ranked: Vec<_> = self
            .actions()
            .iter()
            .cloned()
            .zip(scores.iter().cloned())
            .collect();
        ranked.sort_by_key(|&(_, score)| std::cmp::Reverse(OrderedFloat(score)));

        Ok(ranked.into_iter().map(|(action, _)| action).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, ActionSet, SwapIndices, Transition, TransitionError};
    use crate::sentence::tests::three_token_sentence;
    use crate::system::ParserState;

    #[test]
    fn action_set_sizes() {
        assert_eq!(ActionSet::new(false).len(), 3);
        assert_eq!(ActionSet::new(true).len(), 4);
        assert_eq!(ActionSet::new(false).index(Action::Swap), None);
        assert_eq!(ActionSet::new(true).index(Action::Swap), Some(3));
    }

    #[test]
    fn one_hot() {
        let actions = ActionSet::new(false);
        assert_eq!(actions.one_hot(Action::LeftArc), Some(vec![0., 1., 0.]));
        assert_eq!(actions.one_hot(Action::Swap), None);
        assert_eq!(
            ActionSet::new(true).one_hot(Action::Swap),
            Some(vec![0., 0., 0., 1.])
        );
    }

    #[test]
    fn rank_by_score() {
        let actions = ActionSet::new(true);
        assert_eq!(
            actions.rank(&[0.1, 0.2, 0.6, 0.1]).unwrap(),
            vec![Action::RightArc, Action::LeftArc, Action::Shift, Action::Swap]
        );
        assert!(actions.rank(&[0.5, 0.5]).is_err());
    }

    #[test]
    fn apply_leaves_state_untouched() {
        let sentence = three_token_sentence();
        let state = ParserState::new(&sentence);

        assert_eq!(
            Transition::LeftArc.apply(&state),
            Err(TransitionError::StackTooSmall)
        );

        let shifted = Transition::Shift.apply(&state).unwrap();
        assert_eq!(shifted.stack().len(), 1);
        assert_eq!(state.stack().len(), 0);
        assert_eq!(state.buffer().len(), 3);
    }

    #[test]
    fn swap_out_of_bounds() {
        let sentence = three_token_sentence();
        let state = Transition::Shift
            .apply(&ParserState::new(&sentence))
            .unwrap();
        let indices = SwapIndices {
            stack: 1,
            buffer: 0,
        };
        assert_eq!(
            Transition::Swap(indices).apply(&state),
            Err(TransitionError::SwapOutOfBounds(indices))
        );
    }
}
