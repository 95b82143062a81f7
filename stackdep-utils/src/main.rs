use std::io::stdout;

use clap::{crate_version, App, AppSettings, Arg, Shell, SubCommand};

mod subcommands;

mod traits;
pub use self::traits::{StackdepApp, StackdepConfigApp};

static DEFAULT_CLAP_SETTINGS: &[AppSettings] = &[
    AppSettings::DontCollapseArgsInUsage,
    AppSettings::UnifiedHelpMessage,
    AppSettings::SubcommandRequiredElseHelp,
];

fn main() {
    // Known subapplications.
    let apps = vec![
        subcommands::ExtractApp::app(),
        subcommands::NonProjectiveApp::app(),
        subcommands::ParseApp::app(),
        subcommands::TestApp::app(),
        subcommands::TrainApp::app(),
    ];

    let cli = App::new("stackdep")
        .settings(DEFAULT_CLAP_SETTINGS)
        .about("A transition-based dependency parser")
        .version(crate_version!())
        .subcommands(apps)
        .subcommand(
            SubCommand::with_name("completions")
                .about("Generate completion scripts for your shell")
                .setting(AppSettings::ArgRequiredElseHelp)
                .arg(Arg::with_name("shell").possible_values(&Shell::variants())),
        );
    let matches = cli.clone().get_matches();

    match matches.subcommand_name().unwrap() {
        "completions" => {
            let shell = matches
                .subcommand_matches("completions")
                .unwrap()
                .value_of("shell")
                .unwrap();
            write_completion_script(cli, shell.parse::<Shell>().unwrap());
        }
        "extract" => {
            subcommands::ExtractApp::parse(matches.subcommand_matches("extract").unwrap()).run()
        }
        "nonprojective" => subcommands::NonProjectiveApp::parse(
            matches.subcommand_matches("nonprojective").unwrap(),
        )
        .run(),
        "parse" => subcommands::ParseApp::parse(matches.subcommand_matches("parse").unwrap()).run(),
        "test" => subcommands::TestApp::parse(matches.subcommand_matches("test").unwrap()).run(),
        "train" => subcommands::TrainApp::parse(matches.subcommand_matches("train").unwrap()).run(),
        _unknown => unreachable!(),
    }
}

fn write_completion_script(mut cli: App, shell: Shell) {
    cli.gen_completions_to("stackdep", shell, &mut stdout());
}
