use std::fs::File;
use std::io::{BufReader, BufWriter};

use clap::{App, Arg, ArgMatches};
use serde_derive::Serialize;
use stackdep::corpus::{Corpus, VocabMode};
use stackdep::wrapper::{Config, Parser};
use stackdep::{EvalResults, EvalSummary, SentenceEval, Vocabularies};
use stackdep_utils::{item_progress, read_config, ReadProgress};
use stdinout::OrExit;

use crate::traits::{StackdepApp, StackdepConfigApp};

static FAILED: &str = "FAILED";
static RESULTS: &str = "RESULTS";
static TEST_DATA: &str = "TEST_DATA";
static TRACE: &str = "TRACE";

/// Evaluation results together with the configuration that produced
/// them.
#[derive(Serialize)]
struct ResultsRecord<'a> {
    config: &'a Config,
    results: EvalResults,
}

pub struct TestApp {
    config: String,
    failed: Option<String>,
    results: Option<String>,
    test_data: String,
    trace: bool,
}

impl TestApp {
    fn write_failed(&self, corpus: &Corpus, summary: &EvalSummary) {
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

    fn write_results(&self, config: &Config, results: EvalResults) {
        let filename = match self.results {
            Some(ref filename) => filename,
            None => return,
        };

        let f = File::create(filename)
            .or_exit(format!("Cannot create results file '{}'", filename), 1);
        serde_json::to_writer_pretty(BufWriter::new(f), &ResultsRecord { config, results })
            .or_exit("Cannot write results", 1);
    }
}

impl StackdepConfigApp for TestApp {}

impl StackdepApp for TestApp {
    fn app() -> App<'static, 'static> {
        Self::config_app("test")
            .about("Parse and evaluate a treebank")
            .arg(
                Arg::with_name(TEST_DATA)
                    .help("Test data (CoNLL-U)")
                    .index(2)
                    .required(true),
            )
            .arg(
                Arg::with_name(FAILED)
                    .long("failed")
                    .value_name("FILE")
                    .takes_value(true)
                    .help("Write sentences that were not parsed correctly to this file"),
            )
            .arg(
                Arg::with_name(RESULTS)
                    .long("results")
                    .value_name("FILE")
                    .takes_value(true)
                    .help("Write the results and configuration as JSON to this file"),
            )
            .arg(
                Arg::with_name(TRACE)
                    .long("trace")
                    .help("Print the parser state after every transition"),
            )
    }

    fn parse(matches: &ArgMatches) -> Self {
        let config = matches.value_of(Self::CONFIG).unwrap().into();
        let failed = matches.value_of(FAILED).map(ToOwned::to_owned);
        let results = matches.value_of(RESULTS).map(ToOwned::to_owned);
        let test_data = matches.value_of(TEST_DATA).unwrap().into();
        let trace = matches.is_present(TRACE);

        TestApp {
            config,
            failed,
            results,
            test_data,
            trace,
        }
    }

    fn run(&self) {
        let config = read_config(&self.config).or_exit("Cannot read configuration", 1);
        let parser = Parser::new(&config).or_exit("Cannot construct parser", 1);

        let test_file = File::open(&self.test_data)
            .or_exit(format!("Cannot open test data '{}'", self.test_data), 1);
        let read_progress = ReadProgress::new(test_file).or_exit("Cannot create progress bar", 1);
        let corpus = Corpus::read(
            BufReader::new(read_progress),
            Vocabularies::default(),
            VocabMode::Frozen,
        )
        .or_exit("Cannot read test data", 1);

        let progress = item_progress(corpus.len(), "sentences");
        let mut summary = EvalSummary::new();
        for (idx, sentence) in corpus.sentences().iter().enumerate() {
            let outcome = if self.trace {
                progress.println(format!("Sentence {}", idx));
                parser.parse_traced(sentence, |state, action| {
                    progress.println(format!("{} -> {}", action, state))
                })
            } else {
                parser.parse(sentence)
            }
            .or_exit(format!("Cannot parse sentence {}", idx), 1);

            if outcome.exhausted {
                progress.println(format!(
                    "Sentence {}: no applicable transition in state {}",
                    idx, outcome.state
                ));
            }

            summary.add(&SentenceEval::new(sentence, &outcome));
            progress.inc(1);
        }
        progress.finish();

        let results = summary.results();
        eprintln!("Sentences: {}", results.n_sentences);
        eprintln!(
            "Successfully parsed: {} ({:.2}%)",
            summary.n_success, results.success_rate
        );
        eprintln!(
            "Completely parsed: {} ({:.2}%)",
            summary.n_complete, results.complete_rate
        );
        eprintln!("Average recall: {:.2}%", results.average_recall);
        eprintln!("Average precision: {:.2}%", results.average_precision);
        eprintln!("Non-projective sentences: {}", results.n_non_projective);
        eprintln!("Failed sentences: {}", summary.failed.len());

        self.write_failed(&corpus, &summary);
        self.write_results(&config, results);
    }
}
