use failure::{Fail, Fallible};
use finalfusion::embeddings::Embeddings as FiFuEmbeddings;
use finalfusion::prelude::*;

use crate::sentence::Token;
use crate::system::ParserState;
use crate::vocab::{Vocab, NULL};

/// Errors in the feature configuration.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum InputError {
    #[fail(display = "stack depth should be in 1..=3, was: {}", _0)]
    StackDepth(usize),

    #[fail(display = "buffer depth should be in 1..=4, was: {}", _0)]
    BufferDepth(usize),

    #[fail(display = "feature vector has length {}, expected {}", _0, _1)]
    Length(usize, usize),
}

/// Word embeddings.
///
/// Words that are not in the embedding vocabulary are represented by a
/// zero vector.
pub struct Embeddings {
    embeddings: FiFuEmbeddings<VocabWrap, StorageWrap>,
}

impl Embeddings {
    pub fn dims(&self) -> usize {
        self.embeddings.dims()
    }

    /// Write the embedding of `word` into `out`.
    ///
    /// The word is looked up as-is first, then lowercased.
    pub fn embedding_into(&self, word: &str, out: &mut [f32]) {
        let embedding = self
            .embeddings
            .embedding(word)
            .or_else(|| self.embeddings.embedding(&word.to_lowercase()));

        match embedding {
            Some(embedding) => {
                for (v, &e) in out.iter_mut().zip(embedding.iter()) {
                    *v = e;
                }
            }
            None => {
                for v in out.iter_mut() {
                    *v = 0.;
                }
            }
        }
    }
}

impl From<FiFuEmbeddings<VocabWrap, StorageWrap>> for Embeddings {
    fn from(embeddings: FiFuEmbeddings<VocabWrap, StorageWrap>) -> Self {
        Embeddings { embeddings }
    }
}

/// Encoding of word forms.
pub enum WordEncoder {
    /// A single value in `[0, 1)`, the MD5 hash of the lowercased form
    /// modulo `modulus`, divided by `modulus`.
    Hash { modulus: usize },

    /// Word embeddings.
    Embeddings(Embeddings),
}

impl WordEncoder {
    /// Hash encoder, the modulus is the size of the form vocabulary.
    pub fn hash(forms: &Vocab) -> Self {
        WordEncoder::Hash {
            modulus: forms.len(),
        }
    }

    /// Length of the encoding of a single word.
    pub fn len(&self) -> usize {
        match self {
            WordEncoder::Hash { .. } => 1,
            WordEncoder::Embeddings(embeddings) => embeddings.dims(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn encode_into(&self, form: &str, out: &mut [f32]) {
        match self {
            WordEncoder::Hash { modulus } => out[0] = hash_word(form, *modulus),
            WordEncoder::Embeddings(embeddings) => embeddings.embedding_into(form, out),
        }
    }
}

/// Hash a word form to a value in `[0, 1)`.
///
/// The form is lowercased, its MD5 digest is read as a big-endian
/// integer and reduced modulo `modulus`.
pub fn hash_word(form: &str, modulus: usize) -> f32 {
    if modulus == 0 {
        return 0.;
    }

    let digest = md5::compute(form.to_lowercase().as_bytes());
    let value = u128::from_be_bytes(digest.0);
    (value % modulus as u128) as f32 / modulus as f32
}

/// Number of stack and buffer positions that are vectorized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FeatureDepth {
    stack: usize,
    buffer: usize,
}

impl FeatureDepth {
    /// Construct the feature depth, the stack depth must be in `1..=3`,
    /// the buffer depth in `1..=4`.
    pub fn new(stack: usize, buffer: usize) -> Result<Self, InputError> {
        if stack < 1 || stack > 3 {
            return Err(InputError::StackDepth(stack));
        }

        if buffer < 1 || buffer > 4 {
            return Err(InputError::BufferDepth(buffer));
        }

        Ok(FeatureDepth { stack, buffer })
    }

    pub fn stack(&self) -> usize {
        self.stack
    }

    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// Number of token positions.
    pub fn positions(&self) -> usize {
        self.stack + self.buffer
    }
}

/// Vectorizer for parser states.
///
/// A state is represented by the tokens on the topmost stack positions
/// (nearest to the top first), followed by the first buffer positions.
/// Each token contributes its word encoding followed by a one-hot vector
/// of its universal part-of-speech tag. Missing positions are filled
/// with a padding token with form and tag `NULL`.
pub struct InputVectorizer {
    depth: FeatureDepth,
    word_encoder: WordEncoder,
    upostags: Vocab,
}

impl InputVectorizer {
    pub fn new(depth: FeatureDepth, word_encoder: WordEncoder, upostags: Vocab) -> Self {
        InputVectorizer {
            depth,
            word_encoder,
            upostags,
        }
    }

    pub fn depth(&self) -> FeatureDepth {
        self.depth
    }

    pub fn upostags(&self) -> &Vocab {
        &self.upostags
    }

    pub fn word_encoder(&self) -> &WordEncoder {
        &self.word_encoder
    }

    /// Length of the encoding of a single token position.
    pub fn token_len(&self) -> usize {
        self.word_encoder.len() + self.upostags.len()
    }

    /// Length of a feature vector.
    pub fn input_len(&self) -> usize {
        self.depth.positions() * self.token_len()
    }

    /// Vectorize a parser state.
    pub fn realize(&self, state: &ParserState) -> Vec<f32> {
        let mut input = vec![0.; self.input_len()];
        self.write_state(state, &mut input);
        input
    }

    /// Vectorize a parser state into an existing vector.
    pub fn realize_into(&self, state: &ParserState, input: &mut [f32]) -> Fallible<()> {
        if input.len() != self.input_len() {
            return Err(InputError::Length(input.len(), self.input_len()).into());
        }

        self.write_state(state, input);

        Ok(())
    }

    fn write_state(&self, state: &ParserState, input: &mut [f32]) {
        let stack = (0..self.depth.stack).map(|depth| state.stack_token(depth));
        let buffer = (0..self.depth.buffer).map(|offset| state.buffer_token(offset));

        for (token, chunk) in stack
            .chain(buffer)
            .zip(input.chunks_exact_mut(self.token_len()))
        {
            self.write_token(token, chunk);
        }
    }

    fn write_token(&self, token: Option<&Token>, out: &mut [f32]) {
        let (form, upostag) = match token {
            Some(token) => (token.form(), token.upostag()),
            None => (NULL, NULL),
        };

        let (word, tag) = out.split_at_mut(self.word_encoder.len());
        self.word_encoder.encode_into(form, word);

        for v in tag.iter_mut() {
            *v = 0.;
        }
        tag[self.upostags.index_or_null(upostag)] = 1.;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{hash_word, FeatureDepth, InputError, InputVectorizer, WordEncoder};
    use crate::sentence::tests::three_token_sentence;
    use crate::system::{ParserState, Transition};
    use crate::vocab::Vocab;

    fn vectorizer(stack: usize, buffer: usize) -> InputVectorizer {
        let mut forms = Vocab::new();
        let mut upostags = Vocab::new();
        for token in three_token_sentence().tokens() {
            forms.add(token.form().to_lowercase());
            upostags.add(token.upostag());
        }

        InputVectorizer::new(
            FeatureDepth::new(stack, buffer).unwrap(),
            WordEncoder::hash(&forms),
            upostags,
        )
    }

    #[test]
    fn depth_ranges() {
        assert_eq!(FeatureDepth::new(0, 1), Err(InputError::StackDepth(0)));
        assert_eq!(FeatureDepth::new(4, 1), Err(InputError::StackDepth(4)));
        assert_eq!(FeatureDepth::new(1, 0), Err(InputError::BufferDepth(0)));
        assert_eq!(FeatureDepth::new(1, 5), Err(InputError::BufferDepth(5)));
        assert!(FeatureDepth::new(3, 4).is_ok());
    }

    #[test]
    fn hash_is_normalized() {
        for word in &["the", "dog", "NULL", "", "Überraschung"] {
            let value = hash_word(word, 7);
            assert!(value >= 0. && value < 1.);
        }
    }

    #[test]
    fn hash_ignores_case() {
        assert_relative_eq!(hash_word("Mary", 1000), hash_word("mary", 1000));
    }

    #[test]
    fn hash_of_known_digest() {
        // md5("a") = 0cc175b9c0f1b6a831c399e269772661, which is odd.
        assert_relative_eq!(hash_word("a", 2), 0.5);
    }

    #[test]
    fn input_length_is_invariant() {
        let sentence = three_token_sentence();
        let vectorizer = vectorizer(3, 4);

        // NULL, PROPN, VERB: 1 hash value + 3 tags per position.
        assert_eq!(vectorizer.input_len(), 7 * 4);

        let mut state = ParserState::new(&sentence);
        let mut states = vec![state.clone()];
        for transition in &[Transition::Shift, Transition::Shift, Transition::Shift] {
            transition.apply_mut(&mut state).unwrap();
            states.push(state.clone());
        }

        for state in &states {
            assert_eq!(vectorizer.realize(state).len(), vectorizer.input_len());
        }
    }

    #[test]
    fn positions_and_padding() {
        let sentence = three_token_sentence();
        let vectorizer = vectorizer(2, 1);

        let mut state = ParserState::new(&sentence);
        state.shift().unwrap();
        let input = vectorizer.realize(&state);

        // Stack top: John (PROPN).
        assert_relative_eq!(input[0], hash_word("john", 4));
        assert_eq!(&input[1..4], &[0., 1., 0.]);

        // Below the stack top: padding.
        assert_relative_eq!(input[4], hash_word("NULL", 4));
        assert_eq!(&input[5..8], &[1., 0., 0.]);

        // Buffer front: saw (VERB).
        assert_relative_eq!(input[8], hash_word("saw", 4));
        assert_eq!(&input[9..12], &[0., 0., 1.]);
    }

    #[test]
    fn unknown_tags_map_to_null() {
        let sentence = three_token_sentence();
        let vectorizer = InputVectorizer::new(
            FeatureDepth::new(1, 1).unwrap(),
            WordEncoder::Hash { modulus: 10 },
            Vocab::new(),
        );

        let input = vectorizer.realize(&ParserState::new(&sentence));
        assert_eq!(input.len(), 4);
        assert_eq!(input[1], 1.);
        assert_eq!(input[3], 1.);
    }

    #[test]
    fn realize_into_checks_length() {
        let sentence = three_token_sentence();
        let vectorizer = vectorizer(1, 1);
        let mut input = vec![0.; 3];
        assert!(vectorizer
            .realize_into(&ParserState::new(&sentence), &mut input)
            .is_err());
    }
}
