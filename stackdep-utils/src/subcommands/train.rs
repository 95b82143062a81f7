use std::fs::File;
use std::io::BufReader;

use clap::{App, Arg, ArgMatches};
use failure::{ensure, Fallible};
use ordered_float::NotNan;
use stackdep::model::{
    Batch, ConstantLearningRate, ExponentialDecay, LearningRateSchedule, PlateauLearningRate,
    Trainer,
};
use stackdep::wrapper::Config;
use stackdep::PatternSet;
use stackdep_utils::{
    item_progress, read_config, CompletedUnit, ReadProgress, SaveSchedule, SaveScheduler,
};
use stdinout::OrExit;

use crate::traits::{StackdepApp, StackdepConfigApp};

static CONTINUE: &str = "CONTINUE";
static EPOCHS: &str = "EPOCHS";
static INITIAL_LR: &str = "INITIAL_LR";
static LR_DECAY_EPOCHS: &str = "LR_DECAY_EPOCHS";
static LR_DECAY_RATE: &str = "LR_DECAY_RATE";
static LR_PATIENCE: &str = "LR_PATIENCE";
static LR_SCALE: &str = "LR_SCALE";
static LR_SCHEDULE: &str = "LR_SCHEDULE";
static PATIENCE: &str = "PATIENCE";
static PATTERNS: &str = "PATTERNS";
static SAVE_BATCHES: &str = "SAVE_BATCHES";
static VALIDATION_DATA: &str = "VALIDATION_DATA";
static WARMUP: &str = "WARMUP";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LrScheduleType {
    Constant,
    Exponential,
    Plateau,
}

pub struct LrSchedule {
    pub schedule_type: LrScheduleType,
    pub initial_lr: NotNan<f32>,
    pub lr_scale: NotNan<f32>,
    pub lr_patience: usize,
    pub decay_rate: NotNan<f32>,
    pub decay_epochs: usize,
    pub warmup_steps: usize,
}

pub struct TrainApp {
    config: String,
    epochs: Option<usize>,
    lr_schedule: LrSchedule,
    parameters: Option<String>,
    patience: usize,
    patterns: String,
    save_schedule: SaveSchedule,
    validation_data: Option<String>,
}

impl TrainApp {
    pub fn lr_schedule(&self) -> Fallible<Box<dyn LearningRateSchedule>> {
        let lr = self.lr_schedule.initial_lr.into_inner();
        let warmup_steps = self.lr_schedule.warmup_steps;

        Ok(match self.lr_schedule.schedule_type {
            LrScheduleType::Constant => Box::new(ConstantLearningRate::new(lr)?),
            LrScheduleType::Exponential => Box::new(ExponentialDecay::new(
                lr,
                self.lr_schedule.decay_rate.into_inner(),
                self.lr_schedule.decay_epochs,
                true,
                warmup_steps,
            )?),
            LrScheduleType::Plateau => Box::new(PlateauLearningRate::new(
                lr,
                self.lr_schedule.lr_scale.into_inner(),
                self.lr_schedule.lr_patience,
                warmup_steps,
            )?),
        })
    }

    fn run_epoch(
        &self,
        trainer: &mut Trainer,
        batches: &[Batch],
        save_scheduler: &mut SaveScheduler,
        lr_schedule: &mut dyn LearningRateSchedule,
        global_step: &mut usize,
        is_training: bool,
    ) -> (f32, f32) {
        let epoch_type = if is_training { "train" } else { "validation" };
        let progress_bar = item_progress(batches.len(), epoch_type);

        let mut instances = 0;
        let mut acc = 0f32;
        let mut loss = 0f32;

        for batch in batches {
            let batch_perf = if is_training {
                let lr = lr_schedule.step_learning_rate(*global_step);
                *global_step += 1;
                trainer.train(batch, lr)
            } else {
                trainer.validate(batch)
            }
            .or_exit("Cannot process batch", 1);

            loss += batch.len() as f32 * batch_perf.loss;
            acc += batch.len() as f32 * batch_perf.accuracy;
            instances += batch.len();

            if is_training {
                save_scheduler.save(trainer, CompletedUnit::Batch).or_exit(
                    format!("Cannot save model for batch {}", save_scheduler.batch()),
                    1,
                );
            }

            progress_bar.set_message(&format!(
                "batch loss: {:.4}, batch accuracy: {:.4}",
                batch_perf.loss, batch_perf.accuracy
            ));
            progress_bar.inc(1);
        }

        progress_bar.finish_and_clear();

        if instances > 0 {
            loss /= instances as f32;
            acc /= instances as f32;
        }

        (loss, acc)
    }

    fn train_model(
        &self,
        config: &Config,
        mut trainer: Trainer,
        train_patterns: &PatternSet,
        validation_patterns: Option<&PatternSet>,
    ) -> Fallible<()> {
        let batch_size = config.model.batch_size;
        let validation_batches = match validation_patterns {
            Some(patterns) => Some(trainer.batches(patterns.patterns(), batch_size, false)?),
            None => None,
        };

        let mut best_epoch = 0;
        let mut best_acc = 0.0;
        let mut last_acc = 0.0;
        let mut global_step = 0;

        let mut lr_schedule = self.lr_schedule()?;
        let mut save_scheduler = self.save_schedule.to_save_scheduler("");

        for epoch in 0.. {
            if self.epochs.map(|epochs| epoch >= epochs).unwrap_or(false) {
                eprintln!(
                    "Finished {} epochs. Best epoch: {} with accuracy: {:.4}",
                    epoch, best_epoch, best_acc
                );
                break;
            }

            let lr = lr_schedule.epoch_learning_rate(epoch, last_acc);

            let train_batches = trainer.batches(train_patterns.patterns(), batch_size, true)?;
            let (loss, train_acc) = self.run_epoch(
                &mut trainer,
                &train_batches,
                &mut save_scheduler,
                lr_schedule.as_mut(),
                &mut global_step,
                true,
            );

            eprintln!(
                "Epoch {} (train, lr: {:.4}): loss: {:.4}, acc: {:.4}",
                epoch, lr, loss, train_acc
            );

            save_scheduler.save(&trainer, CompletedUnit::Epoch).or_exit(
                format!("Cannot save model for epoch {}", save_scheduler.epoch()),
                1,
            );

            let (loss, acc) = match validation_batches {
                Some(ref batches) => self.run_epoch(
                    &mut trainer,
                    batches,
                    &mut save_scheduler,
                    lr_schedule.as_mut(),
                    &mut global_step,
                    false,
                ),
                None => (loss, train_acc),
            };

            last_acc = acc;
            if epoch == 0 || acc > best_acc {
                best_epoch = epoch;
                best_acc = acc;
                trainer.save(&config.model.parameters)?;
            }

            let epoch_status = if best_epoch == epoch { "*" } else { "" };

            eprintln!(
                "Epoch {} (validation): loss: {:.4}, acc: {:.4}, best epoch: {}, best acc: {:.4} {}",
                epoch, loss, acc, best_epoch, best_acc, epoch_status
            );

            if epoch - best_epoch == self.patience {
                eprintln!(
                    "Lost my patience! Best epoch: {} with accuracy: {:.4}",
                    best_epoch, best_acc
                );
                break;
            }
        }

        Ok(())
    }
}

fn read_patterns(filename: &str) -> PatternSet {
    let f = File::open(filename).or_exit(format!("Cannot open pattern file '{}'", filename), 1);
    let read_progress = ReadProgress::new(f).or_exit("Cannot create progress bar", 1);
    PatternSet::from_json_read(BufReader::new(read_progress))
        .or_exit(format!("Cannot read patterns from '{}'", filename), 1)
}

/// Check that the patterns fit the vectorizer and transition system of
/// the configuration.
fn check_patterns(config: &Config, patterns: &PatternSet) -> Fallible<(usize, usize)> {
    ensure!(!patterns.is_empty(), "Pattern set is empty");

    let vocabs = config.vocab.load()?;
    let input_len = config.vectorizer(&vocabs)?.input_len();
    let n_actions = config.system.actions().len();

    // Non-empty sets always have lengths.
    let pattern_inputs = patterns.input_len().unwrap_or(0);
    let pattern_outputs = patterns.output_len().unwrap_or(0);

    ensure!(
        pattern_inputs == input_len,
        "Patterns have input length {}, the configuration gives {}",
        pattern_inputs,
        input_len
    );
    ensure!(
        pattern_outputs == n_actions,
        "Patterns have {} outputs, the transition system has {} actions",
        pattern_outputs,
        n_actions
    );

    Ok((input_len, n_actions))
}

impl StackdepConfigApp for TrainApp {}

impl StackdepApp for TrainApp {
    fn app() -> App<'static, 'static> {
        Self::config_app("train")
            .about("Train a parser model")
            .arg(
                Arg::with_name(PATTERNS)
                    .help("Training patterns")
                    .index(2)
                    .required(true),
            )
            .arg(
                Arg::with_name(VALIDATION_DATA)
                    .long("validation")
                    .value_name("PATTERNS")
                    .takes_value(true)
                    .help("Validation patterns, training accuracy is used without them"),
            )
            .arg(
                Arg::with_name(CONTINUE)
                    .long("continue")
                    .takes_value(true)
                    .value_name("PARAMS")
                    .help("Continue training from parameter files (e.g.: epoch-50)"),
            )
            .arg(
                Arg::with_name(EPOCHS)
                    .long("epochs")
                    .value_name("N")
                    .takes_value(true)
                    .help("Maximum number of epochs"),
            )
            .arg(
                Arg::with_name(INITIAL_LR)
                    .long("lr")
                    .value_name("LR")
                    .help("Initial learning rate")
                    .default_value("0.01"),
            )
            .arg(
                Arg::with_name(LR_SCHEDULE)
                    .long("lr-schedule")
                    .value_name("SCHEDULE")
                    .possible_values(&["constant", "exponential", "plateau"])
                    .help("Learning rate schedule")
                    .default_value("plateau"),
            )
            .arg(
                Arg::with_name(LR_PATIENCE)
                    .long("lr-patience")
                    .value_name("N")
                    .help("Scale learning rate after N epochs without improvement")
                    .default_value("4"),
            )
            .arg(
                Arg::with_name(LR_SCALE)
                    .long("lr-scale")
                    .value_name("SCALE")
                    .help("Value to scale the learning rate by")
                    .default_value("0.5"),
            )
            .arg(
                Arg::with_name(LR_DECAY_RATE)
                    .long("lr-decay-rate")
                    .value_name("RATE")
                    .help("Exponential decay rate")
                    .default_value("0.95"),
            )
            .arg(
                Arg::with_name(LR_DECAY_EPOCHS)
                    .long("lr-decay-epochs")
                    .value_name("N")
                    .help("Decay the learning rate every N epochs")
                    .default_value("1"),
            )
            .arg(
                Arg::with_name(WARMUP)
                    .long("warmup")
                    .value_name("N")
                    .help("Linearly increase the learning rate during the first N batches")
                    .default_value("0"),
            )
            .arg(
                Arg::with_name(PATIENCE)
                    .long("patience")
                    .value_name("N")
                    .help("Maximum number of epochs without improvement")
                    .default_value("15"),
            )
            .arg(
                Arg::with_name(SAVE_BATCHES)
                    .long("save-batches")
                    .value_name("N")
                    .takes_value(true)
                    .help("Also save parameters every N batches"),
            )
    }

    fn parse(matches: &ArgMatches) -> Self {
        let config = matches.value_of(Self::CONFIG).unwrap().into();
        let epochs = matches
            .value_of(EPOCHS)
            .map(|v| v.parse().or_exit("Cannot parse number of epochs", 1));
        let initial_lr = matches
            .value_of(INITIAL_LR)
            .unwrap()
            .parse()
            .or_exit("Cannot parse initial learning rate", 1);
        let schedule_type = match matches.value_of(LR_SCHEDULE).unwrap() {
            "constant" => LrScheduleType::Constant,
            "exponential" => LrScheduleType::Exponential,
            "plateau" => LrScheduleType::Plateau,
            _ => unreachable!(),
        };
        let lr_patience = matches
            .value_of(LR_PATIENCE)
            .unwrap()
            .parse()
            .or_exit("Cannot parse learning rate patience", 1);
        let lr_scale = matches
            .value_of(LR_SCALE)
            .unwrap()
            .parse()
            .or_exit("Cannot parse learning rate scale", 1);
        let decay_rate = matches
            .value_of(LR_DECAY_RATE)
            .unwrap()
            .parse()
            .or_exit("Cannot parse learning rate decay rate", 1);
        let decay_epochs = matches
            .value_of(LR_DECAY_EPOCHS)
            .unwrap()
            .parse()
            .or_exit("Cannot parse learning rate decay epochs", 1);
        let warmup_steps = matches
            .value_of(WARMUP)
            .unwrap()
            .parse()
            .or_exit("Cannot parse number of warmup batches", 1);
        let parameters = matches.value_of(CONTINUE).map(ToOwned::to_owned);
        let patience = matches
            .value_of(PATIENCE)
            .unwrap()
            .parse()
            .or_exit("Cannot parse patience", 1);
        let save_schedule = match matches.value_of(SAVE_BATCHES) {
            Some(v) => {
                let batches: usize = v.parse().or_exit("Cannot parse number of batches", 1);
                if batches == 0 {
                    eprintln!("The number of batches between saves must be non-zero");
                    std::process::exit(1);
                }
                SaveSchedule::EpochAndBatches(batches)
            }
            None => SaveSchedule::Epoch,
        };
        let patterns = matches.value_of(PATTERNS).unwrap().into();
        let validation_data = matches.value_of(VALIDATION_DATA).map(ToOwned::to_owned);

        TrainApp {
            config,
            epochs,
            lr_schedule: LrSchedule {
                schedule_type,
                initial_lr,
                lr_scale,
                lr_patience,
                decay_rate,
                decay_epochs,
                warmup_steps,
            },
            parameters,
            patience,
            patterns,
            save_schedule,
            validation_data,
        }
    }

    fn run(&self) {
        let config = read_config(&self.config).or_exit("Cannot read configuration", 1);

        let train_patterns = read_patterns(&self.patterns);
        let (n_inputs, n_outputs) = check_patterns(&config, &train_patterns)
            .or_exit("Training patterns do not match the configuration", 1);
        eprintln!(
            "Read {} training patterns with {} inputs",
            train_patterns.len(),
            n_inputs
        );

        let validation_patterns = self.validation_data.as_ref().map(|filename| {
            let patterns = read_patterns(filename);
            check_patterns(&config, &patterns)
                .or_exit("Validation patterns do not match the configuration", 1);
            patterns
        });

        let network = match self.parameters {
            Some(ref parameters) => config
                .model
                .load_network_from(parameters)
                .or_exit(format!("Cannot load parameters from '{}'", parameters), 1),
            None => config
                .model
                .random_network(n_inputs, n_outputs)
                .or_exit("Cannot construct network", 1),
        };

        let trainer = Trainer::new(network, config.model.seed);

        self.train_model(
            &config,
            trainer,
            &train_patterns,
            validation_patterns.as_ref(),
        )
        .or_exit("Error while training model", 1);
    }
}
