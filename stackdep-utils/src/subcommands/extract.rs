use std::fs::File;
use std::io::{BufReader, BufWriter};

use clap::{App, Arg, ArgMatches};
use stackdep::corpus::VocabMode;
use stackdep::{
    Collector, Corpus, ExtractSummary, Extractor, PatternWriter, SentencePatterns, Vocabularies,
};
use stackdep_utils::{item_progress, read_config, ReadProgress};
use stdinout::OrExit;

use crate::traits::{StackdepApp, StackdepConfigApp};

static FAILED: &str = "FAILED";
static PATTERNS: &str = "PATTERNS";
static SUMMARY: &str = "SUMMARY";
static TRAIN_DATA: &str = "TRAIN_DATA";
static VERBOSE: &str = "VERBOSE";

pub struct ExtractApp {
    config: String,
    failed: Option<String>,
    patterns: String,
    summary: Option<String>,
    train_data: String,
    verbose: bool,
}

impl ExtractApp {
    fn write_failed(&self, corpus: &Corpus, summary: &ExtractSummary) {
        let filename = match self.failed {
            Some(ref filename) => filename,
            None => return,
        };

        let f = File::create(filename).or_exit(
            format!("Cannot create failed sentence file '{}'", filename),
            1,
        );
        corpus
            .write_subset(&summary.failed, BufWriter::new(f))
            .or_exit("Cannot write failed sentences", 1);
    }

    fn write_summary(&self, summary: &ExtractSummary) {
        let filename = match self.summary {
            Some(ref filename) => filename,
            None => return,
        };

        let f = File::create(filename)
            .or_exit(format!("Cannot create summary file '{}'", filename), 1);
        serde_json::to_writer_pretty(BufWriter::new(f), summary)
            .or_exit("Cannot write extraction summary", 1);
    }
}

impl StackdepConfigApp for ExtractApp {}

impl StackdepApp for ExtractApp {
    fn app() -> App<'static, 'static> {
        Self::config_app("extract")
            .about("Extract training patterns from a treebank")
            .arg(
                Arg::with_name(TRAIN_DATA)
                    .help("Training data (CoNLL-U)")
                    .index(2)
                    .required(true),
            )
            .arg(
                Arg::with_name(PATTERNS)
                    .help("Pattern output file")
                    .index(3)
                    .required(true),
            )
            .arg(
                Arg::with_name(FAILED)
                    .long("failed")
                    .value_name("FILE")
                    .takes_value(true)
                    .help("Write sentences without patterns to this file"),
            )
            .arg(
                Arg::with_name(SUMMARY)
                    .long("summary")
                    .value_name("FILE")
                    .takes_value(true)
                    .help("Write extraction statistics as JSON to this file"),
            )
            .arg(
                Arg::with_name(VERBOSE)
                    .long("verbose")
                    .help("Report why sentences fail"),
            )
    }

    fn parse(matches: &ArgMatches) -> Self {
        let config = matches.value_of(Self::CONFIG).unwrap().into();
        let failed = matches.value_of(FAILED).map(ToOwned::to_owned);
        let patterns = matches.value_of(PATTERNS).unwrap().into();
        let summary = matches.value_of(SUMMARY).map(ToOwned::to_owned);
        let train_data = matches.value_of(TRAIN_DATA).unwrap().into();
        let verbose = matches.is_present(VERBOSE);

        ExtractApp {
            config,
            failed,
            patterns,
            summary,
            train_data,
            verbose,
        }
    }

    fn run(&self) {
        let config = read_config(&self.config).or_exit("Cannot read configuration", 1);

        let train_file = File::open(&self.train_data).or_exit(
            format!("Cannot open training data '{}'", self.train_data),
            1,
        );
        let read_progress = ReadProgress::new(train_file).or_exit("Cannot create progress bar", 1);
        let corpus = Corpus::read(
            BufReader::new(read_progress),
            Vocabularies::default(),
            VocabMode::Extract,
        )
        .or_exit("Cannot read training data", 1);

        config
            .vocab
            .save(corpus.vocabs())
            .or_exit("Cannot save vocabularies", 1);

        let vectorizer = config
            .vectorizer(corpus.vocabs())
            .or_exit("Cannot construct vectorizer", 1);
        let extractor = Extractor::new(vectorizer, config.system.actions());

        let patterns_file = File::create(&self.patterns).or_exit(
            format!("Cannot create pattern file '{}'", self.patterns),
            1,
        );
        let mut writer = PatternWriter::new(BufWriter::new(patterns_file))
            .or_exit("Cannot write patterns", 1);

        let progress = item_progress(corpus.len(), "sentences");
        let mut summary = ExtractSummary::new(extractor.vectorizer().input_len());
        for (idx, sentence) in corpus.sentences().iter().enumerate() {
            let patterns = extractor
                .extract_sentence(sentence)
                .or_exit(format!("Cannot extract patterns of sentence {}", idx), 1);

            if self.verbose {
                match patterns {
                    SentencePatterns::Failed(ref err) => {
                        progress.println(format!("Sentence {}: {}", idx, err))
                    }
                    SentencePatterns::Imperfect => progress.println(format!(
                        "Sentence {}: replay does not reconstruct the gold tree",
                        idx
                    )),
                    SentencePatterns::Accepted(_) => (),
                }
            }

            summary
                .add(idx, sentence, patterns, &mut writer)
                .or_exit("Cannot write patterns", 1);
            progress.inc(1);
        }
        progress.finish();

        eprintln!("Collected {} patterns", writer.len());
        writer.finish().or_exit("Cannot write patterns", 1);

        eprintln!("Total number of sentences: {}", summary.n_sentences);
        eprintln!(
            "Successfully processed {} sentences, {} failed",
            summary.n_success,
            summary.n_failed()
        );
        eprintln!(
            "Percentage of successful sentences: {:.2}%",
            summary.success_rate()
        );
        eprintln!("Non-projective sentences: {}", summary.n_non_projective);
        eprintln!("Number of training patterns: {}", summary.n_patterns);
        eprintln!("Vector size: {}", summary.input_len);

        self.write_failed(&corpus, &summary);
        self.write_summary(&summary);
    }
}
