//! CoNLL-U corpora.

use std::io::{BufRead, Cursor, Write};

use conllx::graph::{DepTriple, Sentence as ConllxSentence};
use conllx::io::{ReadSentence, Reader, WriteSentence, Writer};
use conllx::token::TokenBuilder;
use failure::{format_err, Fallible};

use crate::sentence::{Arc, Sentence, Token};
use crate::vocab::Vocabularies;

/// Relation used for tokens attached to the root.
pub const ROOT_RELATION: &str = "root";

/// Minimum number of columns of a token line.
const MIN_COLUMNS: usize = 8;

/// Keep the plain token lines of a CoNLL-U file.
///
/// Comment lines, multiword token and empty node lines (identifiers with
/// `-` or `.`) and lines with fewer than eight columns are dropped. The
/// last two columns of the remaining lines are cleared. Sentences are
/// separated by a single empty line.
pub fn filter_conllu<R>(read: R) -> Fallible<String>
where
    R: BufRead,
{
    let mut filtered = String::new();
    let mut in_sentence = false;

    for line in read.lines() {
        let line = line?;
        let line = line.trim_end();

        if line.is_empty() {
            if in_sentence {
                filtered.push('\n');
                in_sentence = false;
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let columns: Vec<_> = line.split('\t').collect();
        if columns.len() < MIN_COLUMNS || columns[0].contains(|c| c == '-' || c == '.') {
            continue;
        }

        // The enhanced dependency and miscellaneous columns are not used
        // and do not follow the CoNLL-X projective head columns.
        filtered.push_str(&columns[..MIN_COLUMNS].join("\t"));
        filtered.push_str("\t_\t_\n");
        in_sentence = true;
    }

    if in_sentence {
        filtered.push('\n');
    }

    Ok(filtered)
}

/// Convert a `conllx` sentence.
///
/// Token identifiers are the token positions. Tokens without a head
/// are treated as roots, UPOS is read from the coarse-grained
/// part-of-speech column.
pub fn from_conllx(sentence: &ConllxSentence) -> Fallible<Sentence> {
    let mut tokens = Vec::with_capacity(sentence.len().saturating_sub(1));

    for idx in 1..sentence.len() {
        let token = sentence[idx]
            .token()
            .ok_or_else(|| format_err!("Node {} is not a token", idx))?;

        let (head, deprel) = match sentence.dep_graph().head(idx) {
            Some(triple) => (triple.head(), triple.relation().unwrap_or("_").to_owned()),
            None => (0, "_".to_owned()),
        };

        tokens.push(
            Token::new(idx, token.form(), token.cpos().unwrap_or("_"), head)
                .with_lemma(token.lemma().unwrap_or("_"))
                .with_deprel(deprel),
        );
    }

    Ok(Sentence::new(tokens))
}

/// Convert a sentence to a `conllx` sentence, attaching tokens using
/// the given arcs.
///
/// Tokens without an incoming arc are attached to the root. Only root
/// attachments get a relation, the gold relations are never copied.
pub fn to_conllx_with_arcs(sentence: &Sentence, arcs: &[Arc]) -> ConllxSentence {
    let mut heads = vec![0; sentence.len() + 1];
    for arc in arcs {
        if arc.dependent < heads.len() {
            heads[arc.dependent] = arc.head;
        }
    }

    build_conllx(sentence, |token| {
        let head = heads[token.id()];
        if head == 0 {
            (head, ROOT_RELATION)
        } else {
            (head, "_")
        }
    })
}

/// Convert a sentence with its gold annotation to a `conllx` sentence.
pub fn to_conllx(sentence: &Sentence) -> ConllxSentence {
    build_conllx(sentence, |token| (token.head(), token.deprel()))
}

fn build_conllx<'a, F>(sentence: &'a Sentence, attachment: F) -> ConllxSentence
where
    F: Fn(&'a Token) -> (usize, &'a str),
{
    let mut conllx_sentence = ConllxSentence::new();
    for token in sentence.tokens() {
        conllx_sentence.push(
            TokenBuilder::new(token.form())
                .lemma(token.lemma())
                .cpos(token.upostag())
                .pos(token.upostag())
                .into(),
        );
    }

    for token in sentence.tokens() {
        let (head, relation) = attachment(token);
        conllx_sentence
            .dep_graph_mut()
            .add_deprel(DepTriple::new(head, Some(relation), token.id()));
    }

    conllx_sentence
}

/// Read sentences from CoNLL-U data.
pub fn read_sentences<R>(read: R) -> Fallible<Vec<Sentence>>
where
    R: BufRead,
{
    let filtered = filter_conllu(read)?;
    let reader = Reader::new(Cursor::new(filtered));

    let mut sentences = Vec::new();
    for sentence in reader.sentences() {
        sentences.push(from_conllx(&sentence?)?);
    }

    Ok(sentences)
}

/// Write sentences in CoNLL-X format.
pub fn write_sentences<'a, W, I>(write: W, sentences: I) -> Fallible<()>
where
    W: Write,
    I: IntoIterator<Item = &'a Sentence>,
{
    let mut writer = Writer::new(write);
    for sentence in sentences {
        writer.write_sentence(&to_conllx(sentence))?;
    }

    Ok(())
}

/// Mode of corpus loading.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VocabMode {
    /// Add the values of every token to the vocabularies.
    Extract,

    /// Leave the vocabularies untouched.
    Frozen,
}

/// A corpus of sentences and the vocabularies used to vectorize them.
pub struct Corpus {
    sentences: Vec<Sentence>,
    vocabs: Vocabularies,
}

impl Corpus {
    /// Read a corpus from CoNLL-U data.
    ///
    /// In `VocabMode::Extract`, `vocabs` is extended with the lowercased
    /// forms, lemmas and UPOS tags of the corpus.
    pub fn read<R>(read: R, mut vocabs: Vocabularies, mode: VocabMode) -> Fallible<Self>
    where
        R: BufRead,
    {
        let sentences = read_sentences(read)?;

        if mode == VocabMode::Extract {
            for token in sentences.iter().flat_map(Sentence::tokens) {
                vocabs.update(token);
            }
        }

        Ok(Corpus { sentences, vocabs })
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn vocabs(&self) -> &Vocabularies {
        &self.vocabs
    }

    pub fn into_vocabs(self) -> Vocabularies {
        self.vocabs
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Write the sentences with the given indices.
    pub fn write_subset<W>(&self, indices: &[usize], write: W) -> Fallible<()>
    where
        W: Write,
    {
        let subset = indices
            .iter()
            .map(|&idx| {
                self.sentences
                    .get(idx)
                    .ok_or_else(|| format_err!("Sentence index out of bounds: {}", idx))
            })
            .collect::<Fallible<Vec<_>>>()?;

        write_sentences(write, subset)
    }
}
