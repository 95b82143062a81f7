use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use failure::{format_err, Error, Fail, Fallible, ResultExt};
use finalfusion::embeddings::Embeddings as FiFuEmbeddings;
use finalfusion::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::input::{FeatureDepth, InputVectorizer, WordEncoder};
use crate::model::{Activation, FeedForward};
use crate::serialization::CborRead;
use crate::system::ActionSet;
use crate::vocab::{Vocab, Vocabularies};

/// Configuration errors.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum ConfigError {
    #[fail(display = "batch size should be at least 1")]
    BatchSize,

    #[fail(display = "hidden layer {} has no units", _0)]
    HiddenUnits(usize),
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub input: Input,
    pub vocab: VocabFiles,
    pub system: System,
    pub model: Model,
}

impl Config {
    /// Make configuration paths relative to the configuration file.
    pub fn relativize_paths<P>(&mut self, config_path: P) -> Result<(), Error>
    where
        P: AsRef<Path>,
    {
        let config_path = config_path.as_ref();

        if let WordEncoding::Embeddings(ref mut embeddings) = self.input.word {
            embeddings.filename = relativize_path(config_path, &embeddings.filename)?;
        }
        self.vocab.forms = relativize_path(config_path, &self.vocab.forms)?;
        self.vocab.lemmas = relativize_path(config_path, &self.vocab.lemmas)?;
        self.vocab.upostags = relativize_path(config_path, &self.vocab.upostags)?;
        self.model.parameters = relativize_path(config_path, &self.model.parameters)?;

        Ok(())
    }

    /// Construct the vectorizer for the given vocabularies.
    pub fn vectorizer(&self, vocabs: &Vocabularies) -> Fallible<InputVectorizer> {
        let depth = FeatureDepth::new(self.input.stack_depth, self.input.buffer_depth)?;
        let word_encoder = self.input.word.load_encoder(&vocabs.forms)?;
        Ok(InputVectorizer::new(
            depth,
            word_encoder,
            vocabs.upostags.clone(),
        ))
    }
}

pub trait TomlRead {
    fn from_toml_read<R>(read: R) -> Result<Config, Error>
    where
        R: Read;
}

impl TomlRead for Config {
    fn from_toml_read<R>(mut read: R) -> Result<Self, Error>
    where
        R: Read,
    {
        let mut data = String::new();
        read.read_to_string(&mut data)?;
        let config: Config = toml::from_str(&data)?;

        config.model.validate()?;

        Ok(config)
    }
}

/// Input configuration
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Input {
    /// Number of stack tokens that are vectorized.
    pub stack_depth: usize,

    /// Number of buffer tokens that are vectorized.
    pub buffer_depth: usize,

    pub word: WordEncoding,
}

/// Encoding of word forms.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WordEncoding {
    Hash,
    Embeddings(Embedding),
}

impl WordEncoding {
    pub fn load_encoder(&self, forms: &Vocab) -> Fallible<WordEncoder> {
        match self {
            WordEncoding::Hash => Ok(WordEncoder::hash(forms)),
            WordEncoding::Embeddings(embedding) => {
                let embeddings = embedding.load().with_context(|e| {
                    format!("Cannot load embeddings '{}': {}", embedding.filename, e)
                })?;
                Ok(WordEncoder::Embeddings(embeddings))
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Embedding {
    pub filename: String,
    pub alloc: EmbeddingAlloc,
}

impl Embedding {
    pub fn load(&self) -> Result<crate::input::Embeddings, Error> {
        let f = File::open(&self.filename)?;
        let embeds: FiFuEmbeddings<VocabWrap, StorageWrap> = match self.alloc {
            EmbeddingAlloc::Read => ReadEmbeddings::read_embeddings(&mut BufReader::new(f))?,
            EmbeddingAlloc::Mmap => MmapEmbeddings::mmap_embeddings(&mut BufReader::new(f))?,
        };

        Ok(embeds.into())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingAlloc {
    Mmap,
    Read,
}

/// Vocabulary files.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VocabFiles {
    pub forms: String,
    pub lemmas: String,
    pub upostags: String,
}

impl VocabFiles {
    /// Load the vocabularies, a missing or invalid file is an error.
    pub fn load(&self) -> Fallible<Vocabularies> {
        Ok(Vocabularies::new(
            load_vocab(&self.forms)?,
            load_vocab(&self.lemmas)?,
            load_vocab(&self.upostags)?,
        ))
    }

    pub fn save(&self, vocabs: &Vocabularies) -> Fallible<()> {
        save_vocab(&self.forms, &vocabs.forms)?;
        save_vocab(&self.lemmas, &vocabs.lemmas)?;
        save_vocab(&self.upostags, &vocabs.upostags)
    }
}

fn load_vocab(filename: &str) -> Fallible<Vocab> {
    eprintln!("Loading vocabulary from: {}", filename);

    let f = File::open(filename)
        .with_context(|e| format!("Cannot open vocabulary '{}': {}", filename, e))?;
    let vocab = Vocab::from_json_read(BufReader::new(f))
        .with_context(|e| format!("Cannot read vocabulary '{}': {}", filename, e))?;

    Ok(vocab)
}

fn save_vocab(filename: &str, vocab: &Vocab) -> Fallible<()> {
    let f = File::create(filename)
        .with_context(|e| format!("Cannot create vocabulary '{}': {}", filename, e))?;
    vocab.to_json_write(BufWriter::new(f))
}

/// Transition system configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct System {
    /// Add swap to the action vocabulary.
    pub swap: bool,
}

impl System {
    pub fn actions(&self) -> ActionSet {
        ActionSet::new(self.swap)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HiddenLayer {
    pub units: usize,
    pub activation: Activation,
}

/// Classifier configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Model {
    /// File with the network parameters.
    pub parameters: String,

    pub batch_size: usize,

    /// Seed for weight initialization and batch shuffling.
    pub seed: u64,

    #[serde(default)]
    pub hidden: Vec<HiddenLayer>,
}

impl Model {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::BatchSize);
        }

        if let Some(idx) = self.hidden.iter().position(|layer| layer.units == 0) {
            return Err(ConfigError::HiddenUnits(idx));
        }

        Ok(())
    }

    /// Construct a network with random weights.
    pub fn random_network(&self, n_inputs: usize, n_outputs: usize) -> Fallible<FeedForward> {
        let hidden: Vec<_> = self
            .hidden
            .iter()
            .map(|layer| (layer.units, layer.activation))
            .collect();
        FeedForward::random(n_inputs, &hidden, n_outputs, self.seed)
    }

    /// Load the network from the parameter file.
    pub fn load_network(&self) -> Fallible<FeedForward> {
        self.load_network_from(&self.parameters)
    }

    /// Load a network from a parameter file.
    pub fn load_network_from(&self, filename: &str) -> Fallible<FeedForward> {
        eprintln!("Loading network from: {}", filename);

        let f = File::open(filename)
            .with_context(|e| format!("Cannot open parameter file '{}': {}", filename, e))?;
        let network = FeedForward::from_cbor_read(BufReader::new(f))
            .with_context(|e| format!("Cannot read parameter file '{}': {}", filename, e))?;

        Ok(network)
    }
}

fn relativize_path(config_path: &Path, filename: &str) -> Result<String, Error> {
    if filename.is_empty() {
        return Ok(filename.to_owned());
    }

    let path = Path::new(&filename);

    // Don't touch absolute paths.
    if path.is_absolute() {
        return Ok(filename.to_owned());
    }

    let abs_config_path = config_path.canonicalize()?;
    Ok(abs_config_path
        .parent()
        .ok_or_else(|| {
            format_err!(
                "Cannot get parent path of the configuration file: {}",
                abs_config_path.to_string_lossy()
            )
        })?
        .join(path)
        .to_str()
        .ok_or_else(|| {
            format_err!(
                "Cannot convert parent path to string: {}",
                abs_config_path.to_string_lossy()
            )
        })?
        .to_owned())
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Cursor;
    use std::path::Path;

    use lazy_static::lazy_static;

    use super::{
        Config, ConfigError, Embedding, EmbeddingAlloc, HiddenLayer, Input, Model, System,
        TomlRead, VocabFiles, WordEncoding,
    };
    use crate::model::{Activation, Classifier};
    use crate::vocab::Vocabularies;

    lazy_static! {
        static ref BASIC_PARSER_CHECK: Config = Config {
            input: Input {
                stack_depth: 3,
                buffer_depth: 4,
                word: WordEncoding::Hash,
            },
            vocab: VocabFiles {
                forms: "forms.json".to_owned(),
                lemmas: "lemmas.json".to_owned(),
                upostags: "upostags.json".to_owned(),
            },
            system: System { swap: false },
            model: Model {
                parameters: "stackdep.model".to_owned(),
                batch_size: 32,
                seed: 42,
                hidden: vec![
                    HiddenLayer {
                        units: 64,
                        activation: Activation::Relu,
                    },
                    HiddenLayer {
                        units: 32,
                        activation: Activation::Tanh,
                    },
                ],
            },
        };
    }

    #[test]
    fn test_parse_config() {
        let f = File::open("testdata/stackdep.conf").unwrap();
        let config = Config::from_toml_read(f).unwrap();
        assert_eq!(*BASIC_PARSER_CHECK, config);
    }

    #[test]
    fn embeddings_encoding() {
        let data = r#"
            [input]
            stack_depth = 1
            buffer_depth = 1
            word = { embeddings = { filename = "words.fifu", alloc = "mmap" } }

            [vocab]
            forms = "forms.json"
            lemmas = "lemmas.json"
            upostags = "upostags.json"

            [system]
            swap = true

            [model]
            parameters = "stackdep.model"
            batch_size = 1
            seed = 1
        "#;

        let config = Config::from_toml_read(Cursor::new(data)).unwrap();
        assert_eq!(
            config.input.word,
            WordEncoding::Embeddings(Embedding {
                filename: "words.fifu".to_owned(),
                alloc: EmbeddingAlloc::Mmap,
            })
        );
        assert!(config.model.hidden.is_empty());
        assert_eq!(config.system.actions().len(), 4);
    }

    #[test]
    fn invalid_model_is_rejected() {
        let data = std::fs::read_to_string("testdata/stackdep.conf")
            .unwrap()
            .replace("batch_size = 32", "batch_size = 0");
        let err = Config::from_toml_read(Cursor::new(data)).unwrap_err();
        assert_eq!(err.downcast::<ConfigError>().ok(), Some(ConfigError::BatchSize));
    }

    #[test]
    fn paths_are_relative_to_config() {
        let mut config = BASIC_PARSER_CHECK.clone();
        config.relativize_paths("testdata/stackdep.conf").unwrap();

        let expected = Path::new("testdata")
            .canonicalize()
            .unwrap()
            .join("forms.json");
        assert_eq!(Path::new(&config.vocab.forms), expected.as_path());
    }

    #[test]
    fn missing_vocabulary_is_fatal() {
        let mut config = BASIC_PARSER_CHECK.clone();
        config.vocab.forms = "testdata/does-not-exist.json".to_owned();
        assert!(config.vocab.load().is_err());
    }

    #[test]
    fn network_matches_vectorizer() {
        let vocabs = Vocabularies::default();
        let vectorizer = BASIC_PARSER_CHECK.vectorizer(&vocabs).unwrap();

        // 7 positions, each with a hash value and the NULL tag.
        assert_eq!(vectorizer.input_len(), 14);

        let actions = BASIC_PARSER_CHECK.system.actions();
        let network = BASIC_PARSER_CHECK
            .model
            .random_network(vectorizer.input_len(), actions.len())
            .unwrap();
        assert_eq!(network.n_inputs(), 14);
        assert_eq!(network.n_outputs(), 3);
    }
}
