use std::collections::VecDeque;
use std::fmt;

use itertools::Itertools;

use crate::sentence::{Arc, Sentence, Token};

use super::{SwapIndices, TransitionError};

/// Stack/buffer configuration of the transition system.
///
/// The state borrows the tokens of a sentence, transitions only
/// rearrange references. The top of the stack is the last element of
/// the stack vector, the front of the buffer is its first element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParserState<'a> {
    stack: Vec<&'a Token>,
    buffer: VecDeque<&'a Token>,
    arcs: Vec<Arc>,
}

impl<'a> ParserState<'a> {
    /// Initial state: empty stack, all tokens in the buffer.
    pub fn new(sentence: &'a Sentence) -> Self {
        ParserState {
            stack: Vec::new(),
            buffer: sentence.tokens().iter().collect(),
            arcs: Vec::new(),
        }
    }

    /// Construct a state from its parts.
    pub fn from_parts(stack: Vec<&'a Token>, buffer: VecDeque<&'a Token>, arcs: Vec<Arc>) -> Self {
        ParserState {
            stack,
            buffer,
            arcs,
        }
    }

    pub fn stack(&self) -> &[&'a Token] {
        &self.stack
    }

    pub fn buffer(&self) -> &VecDeque<&'a Token> {
        &self.buffer
    }

    /// Arcs created so far, in order of creation.
    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn into_arcs(self) -> Vec<Arc> {
        self.arcs
    }

    /// Token at `depth` from the stack top, depth 0 is the top.
    pub fn stack_token(&self, depth: usize) -> Option<&'a Token> {
        if depth < self.stack.len() {
            Some(self.stack[self.stack.len() - depth - 1])
        } else {
            None
        }
    }

    /// Token at `offset` from the buffer front.
    pub fn buffer_token(&self, offset: usize) -> Option<&'a Token> {
        self.buffer.get(offset).cloned()
    }

    /// No transition other than swap can be applied anymore.
    pub fn is_terminal(&self) -> bool {
        self.stack.len() < 2 && self.buffer.is_empty()
    }

    /// Move the buffer front onto the stack.
    pub fn shift(&mut self) -> Result<(), TransitionError> {
        let token = self
            .buffer
            .pop_front()
            .ok_or(TransitionError::EmptyBuffer)?;
        self.stack.push(token);
        Ok(())
    }

    /// Pop the stack top and attach it to the token below it.
    pub fn left_arc(&mut self) -> Result<(), TransitionError> {
        if self.stack.len() < 2 {
            return Err(TransitionError::StackTooSmall);
        }

        let dependent = self.stack.pop().ok_or(TransitionError::StackTooSmall)?;
        let head = self.stack[self.stack.len() - 1];
        self.arcs.push(Arc::new(head.id(), dependent.id()));

        Ok(())
    }

    /// Remove the token below the stack top and attach it to the top.
    pub fn right_arc(&mut self) -> Result<(), TransitionError> {
        if self.stack.len() < 2 {
            return Err(TransitionError::StackTooSmall);
        }

        let dependent = self.stack.remove(self.stack.len() - 2);
        let head = self.stack[self.stack.len() - 1];
        self.arcs.push(Arc::new(head.id(), dependent.id()));

        Ok(())
    }

    /// Exchange a stack token with a buffer token.
    pub fn swap(&mut self, indices: SwapIndices) -> Result<(), TransitionError> {
        if indices.stack >= self.stack.len() || indices.buffer >= self.buffer.len() {
            return Err(TransitionError::SwapOutOfBounds(indices));
        }

        std::mem::swap(
            &mut self.stack[indices.stack],
            &mut self.buffer[indices.buffer],
        );

        Ok(())
    }
}

impl<'a> fmt::Display for ParserState<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "stack: [{}] buffer: [{}] arcs: [{}]",
            self.stack.iter().map(|token| token.id()).join(" "),
            self.buffer.iter().map(|token| token.id()).join(" "),
            self.arcs.iter().join(", ")
        )
    }
}
