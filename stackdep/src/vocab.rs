use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{Read, Write};

use failure::{Error, Fail};
use numberer::Numberer;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::sentence::Token;

/// Value that every vocabulary maps to index 0.
pub const NULL: &str = "NULL";

/// Vocabulary errors.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum VocabError {
    #[fail(display = "vocabulary does not map {} to 0", _0)]
    MissingNull(&'static str),

    #[fail(display = "vocabulary indices are not dense, index {} is missing", _0)]
    SparseIndices(usize),

    #[fail(display = "vocabulary index {} is used for more than one value", _0)]
    DuplicateIndex(usize),
}

/// Vocabulary of string values.
///
/// A vocabulary assigns dense indices to values in order of insertion.
/// Index 0 is always reserved for `NULL`, which is used for values that
/// are not in the vocabulary.
pub struct Vocab {
    numberer: Numberer<String>,
}

impl Default for Vocab {
    fn default() -> Self {
        let mut vocab = Vocab {
            numberer: Numberer::new(0),
        };
        vocab.add(NULL);
        vocab
    }
}

impl Vocab {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of values, including `NULL`.
    pub fn len(&self) -> usize {
        self.numberer.len()
    }

    /// A vocabulary is never empty, it always contains `NULL`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Add a value. If the value was added before, its index is returned.
    pub fn add(&mut self, value: impl Into<String>) -> usize {
        self.numberer.add(value.into())
    }

    /// Return the index of a value, `None` if it is not known.
    pub fn index(&self, value: &str) -> Option<usize> {
        self.numberer.number(&value.to_owned())
    }

    /// Return the index of a value, falling back to the `NULL` index.
    pub fn index_or_null(&self, value: &str) -> usize {
        self.index(value).unwrap_or(0)
    }

    /// Return the value for an index.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.numberer.value(index).map(String::as_str)
    }

    /// Values in index order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        (0..self.len()).filter_map(move |index| self.value(index))
    }

    /// Read a vocabulary from a JSON object mapping values to indices.
    pub fn from_json_read<R>(read: R) -> Result<Self, Error>
    where
        R: Read,
    {
        let mapping: HashMap<String, usize> = serde_json::from_reader(read)?;

        if mapping.get(NULL) != Some(&0) {
            return Err(VocabError::MissingNull(NULL).into());
        }

        let mut by_index = BTreeMap::new();
        for (value, index) in mapping {
            match by_index.entry(index) {
                Entry::Vacant(e) => {
                    e.insert(value);
                }
                Entry::Occupied(_) => return Err(VocabError::DuplicateIndex(index).into()),
            }
        }

        let mut numberer = Numberer::new(0);
        for (expected, (index, value)) in by_index.into_iter().enumerate() {
            if index != expected {
                return Err(VocabError::SparseIndices(expected).into());
            }
            numberer.add(value);
        }

        Ok(Vocab { numberer })
    }

    /// Write the vocabulary as a JSON object, in index order.
    pub fn to_json_write<W>(&self, write: W) -> Result<(), Error>
    where
        W: Write,
    {
        serde_json::to_writer_pretty(write, self)?;
        Ok(())
    }
}

impl Clone for Vocab {
    fn clone(&self) -> Self {
        let mut numberer = Numberer::new(0);
        for value in self.values() {
            numberer.add(value.to_owned());
        }
        Vocab { numberer }
    }
}

impl fmt::Debug for Vocab {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.values()).finish()
    }
}

impl PartialEq for Vocab {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.values().eq(other.values())
    }
}

impl Eq for Vocab {}

impl Serialize for Vocab {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (index, value) in self.values().enumerate() {
            map.serialize_entry(value, &index)?;
        }
        map.end()
    }
}

/// The form, lemma, and part-of-speech vocabularies of a corpus.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Vocabularies {
    pub forms: Vocab,
    pub lemmas: Vocab,
    pub upostags: Vocab,
}

impl Vocabularies {
    pub fn new(forms: Vocab, lemmas: Vocab, upostags: Vocab) -> Self {
        Vocabularies {
            forms,
            lemmas,
            upostags,
        }
    }

    /// Add the values of a token. Forms are lowercased.
    pub fn update(&mut self, token: &Token) {
        self.forms.add(token.form().to_lowercase());
        self.lemmas.add(token.lemma());
        self.upostags.add(token.upostag());
    }
}
