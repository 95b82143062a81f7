use std::io::BufWriter;

use clap::{App, Arg, ArgMatches};
use conllx::io::{WriteSentence, Writer};
use stackdep::corpus::{read_sentences, to_conllx_with_arcs};
use stackdep::wrapper::Parser;
use stackdep_utils::read_config;
use stdinout::{Input, OrExit, Output};

use crate::traits::{StackdepApp, StackdepConfigApp};

static INPUT: &str = "INPUT";
static OUTPUT: &str = "OUTPUT";

pub struct ParseApp {
    config: String,
    input: Option<String>,
    output: Option<String>,
}

impl StackdepConfigApp for ParseApp {}

impl StackdepApp for ParseApp {
    fn app() -> App<'static, 'static> {
        Self::config_app("parse")
            .about("Annotate sentences with dependency heads")
            .arg(Arg::with_name(INPUT).help("Input data (CoNLL-U)").index(2))
            .arg(Arg::with_name(OUTPUT).help("Output data").index(3))
    }

    fn parse(matches: &ArgMatches) -> Self {
        let config = matches.value_of(Self::CONFIG).unwrap().into();
        let input = matches.value_of(INPUT).map(ToOwned::to_owned);
        let output = matches.value_of(OUTPUT).map(ToOwned::to_owned);

        ParseApp {
            config,
            input,
            output,
        }
    }

    fn run(&self) {
        let config = read_config(&self.config).or_exit("Cannot read configuration", 1);
        let parser = Parser::new(&config).or_exit("Cannot construct parser", 1);

        let input = Input::from(self.input.as_ref());
        let sentences = read_sentences(input.buf_read().or_exit("Cannot open input for reading", 1))
            .or_exit("Cannot read sentences", 1);

        let output = Output::from(self.output.as_ref());
        let mut writer = Writer::new(BufWriter::new(
            output.write().or_exit("Cannot open output for writing", 1),
        ));

        let mut n_exhausted = 0;
        for (idx, sentence) in sentences.iter().enumerate() {
            let outcome = parser
                .parse(sentence)
                .or_exit(format!("Cannot parse sentence {}", idx), 1);
            if outcome.exhausted {
                n_exhausted += 1;
            }

            writer
                .write_sentence(&to_conllx_with_arcs(sentence, outcome.state.arcs()))
                .or_exit("Cannot write sentence", 1);
        }

        if n_exhausted > 0 {
            eprintln!("{} sentences were not parsed completely", n_exhausted);
        }
    }
}
