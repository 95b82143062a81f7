use std::collections::VecDeque;

use failure::{Fail, Fallible};

use crate::sentence::{spans_cross, Arc, Sentence, Token};

use super::{ParserState, SwapIndices, Transition, TransitionError};

/// Errors that make a sentence unusable for training.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum OracleError {
    #[fail(display = "no transition applies in state {}", _0)]
    NoTransition(String),

    #[fail(display = "no terminal state after {} transitions", _0)]
    StepLimit(usize),

    #[fail(display = "{}", _0)]
    Transition(#[cause] TransitionError),
}

impl From<TransitionError> for OracleError {
    fn from(err: TransitionError) -> Self {
        OracleError::Transition(err)
    }
}

/// Static oracle for the arc/swap transition system.
///
/// The oracle derives the transition sequence for a sentence from its
/// gold heads. The same state always yields the same transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ArcSwapOracle {
    swap: bool,
}

impl ArcSwapOracle {
    /// Construct an oracle. Swap transitions are only proposed when
    /// `swap` is enabled.
    pub fn new(swap: bool) -> Self {
        ArcSwapOracle { swap }
    }

    /// The gold transition for a state.
    pub fn next_transition(&self, state: &ParserState) -> Result<Transition, OracleError> {
        let stack = state.stack();
        let buffer = state.buffer();

        if stack.len() < 2 {
            return Ok(Transition::Shift);
        }

        let top = stack[stack.len() - 1];
        let below = stack[stack.len() - 2];

        if has_dependents_in_buffer(top, buffer) {
            Ok(Transition::Shift)
        } else if top.head() == below.id() {
            Ok(Transition::LeftArc)
        } else if below.head() == top.id() {
            Ok(Transition::RightArc)
        } else if !buffer.is_empty() {
            Ok(Transition::Shift)
        } else {
            let buffer: Vec<_> = buffer.iter().cloned().collect();
            match detect_swap_indices(stack, &buffer) {
                Some(indices) if self.swap => Ok(Transition::Swap(indices)),
                _ => Err(OracleError::NoTransition(state.to_string())),
            }
        }
    }

    /// Replay the gold transition sequence of a sentence.
    ///
    /// `observer` is called with every state and the transition that
    /// is applied to it. Returns the final state. Failures to find a
    /// transition sequence are reported as `OracleError`, errors of
    /// the observer are passed through unchanged.
    pub fn replay<'a, F>(
        &self,
        sentence: &'a Sentence,
        mut observer: F,
    ) -> Fallible<ParserState<'a>>
    where
        F: FnMut(&ParserState<'a>, Transition) -> Fallible<()>,
    {
        let max_steps = step_limit(sentence.len());
        let mut state = ParserState::new(sentence);

        for _ in 0..max_steps {
            if state.is_terminal() {
                return Ok(state);
            }

            let transition = self.next_transition(&state)?;
            observer(&state, transition)?;
            transition
                .apply_mut(&mut state)
                .map_err(OracleError::from)?;
        }

        if state.is_terminal() {
            Ok(state)
        } else {
            Err(OracleError::StepLimit(max_steps).into())
        }
    }
}

// Every shift and attachment consumes a token, swaps are bounded by
// the number of stack/buffer pairs.
fn step_limit(n_tokens: usize) -> usize {
    2 * n_tokens + n_tokens * n_tokens + 1
}

/// Returns `true` if any buffer token has `token` as its gold head.
pub fn has_dependents_in_buffer(token: &Token, buffer: &VecDeque<&Token>) -> bool {
    buffer
        .iter()
        .any(|dependent| dependent.head() == token.id())
}

/// Returns `true` if the gold arcs of two tokens cross.
///
/// Each token is represented by the span between its position and its
/// gold head. Root tokens have no gold arc and never cross.
pub fn crosses(token1: &Token, token2: &Token) -> bool {
    if token1.is_root() || token2.is_root() {
        return false;
    }

    spans_cross(
        Arc::new(token1.head(), token1.id()).span(),
        Arc::new(token2.head(), token2.id()).span(),
    )
}

/// Find a stack token and a buffer token whose gold arcs cross.
///
/// The buffer front is first tested against the token below the stack
/// top. Otherwise the stack is scanned from the top down against the
/// buffer tokens after the front. Finally, the buffer front is tested
/// against the remaining stack tokens, since neighbouring tokens only
/// meet as a stack token and the buffer front. Returns `None` when
/// there is no crossing pair.
pub fn detect_swap_indices(stack: &[&Token], buffer: &[&Token]) -> Option<SwapIndices> {
    let front = buffer.first()?;

    if stack.len() >= 2 && crosses(front, stack[stack.len() - 2]) {
        return Some(SwapIndices {
            stack: stack.len() - 2,
            buffer: 0,
        });
    }

    for (stack_idx, stack_token) in stack.iter().enumerate().rev() {
        for (buffer_idx, buffer_token) in buffer.iter().enumerate().skip(1) {
            if crosses(stack_token, buffer_token) {
                return Some(SwapIndices {
                    stack: stack_idx,
                    buffer: buffer_idx,
                });
            }
        }
    }

    stack
        .iter()
        .rposition(|stack_token| crosses(stack_token, front))
        .map(|stack_idx| SwapIndices {
            stack: stack_idx,
            buffer: 0,
        })
}
