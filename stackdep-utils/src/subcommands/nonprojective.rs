use clap::{App, Arg, ArgMatches};
use stackdep::corpus::read_sentences;
use stdinout::{Input, OrExit};

use crate::traits::{plain_app, StackdepApp};

static INPUT: &str = "INPUT";
static VERBOSE: &str = "VERBOSE";

pub struct NonProjectiveApp {
    input: Option<String>,
    verbose: bool,
}

impl StackdepApp for NonProjectiveApp {
    fn app() -> App<'static, 'static> {
        plain_app("nonprojective")
            .about("Count projective and non-projective sentences")
            .arg(Arg::with_name(INPUT).help("Input data (CoNLL-U)").index(1))
            .arg(
                Arg::with_name(VERBOSE)
                    .long("verbose")
                    .help("Print a crossing arc pair of every non-projective sentence"),
            )
    }

    fn parse(matches: &ArgMatches) -> Self {
        let input = matches.value_of(INPUT).map(ToOwned::to_owned);
        let verbose = matches.is_present(VERBOSE);

        NonProjectiveApp { input, verbose }
    }

    fn run(&self) {
        let input = Input::from(self.input.as_ref());
        let sentences = read_sentences(input.buf_read().or_exit("Cannot open input for reading", 1))
            .or_exit("Cannot read sentences", 1);

        let mut n_non_projective = 0;
        for (idx, sentence) in sentences.iter().enumerate() {
            if let Some((arc1, arc2)) = sentence.crossing_arcs() {
                n_non_projective += 1;

                if self.verbose {
                    eprintln!("Sentence {}: {} crosses {}", idx, arc1, arc2);
                }
            }
        }

        let n_projective = sentences.len() - n_non_projective;
        let percentage = if sentences.is_empty() {
            0.
        } else {
            n_non_projective as f64 / sentences.len() as f64 * 100.
        };

        println!("Projective: {}", n_projective);
        println!("Non-projective: {}", n_non_projective);
        println!("Non-projective percentage: {:.2}%", percentage);
    }
}
