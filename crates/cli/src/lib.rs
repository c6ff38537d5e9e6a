pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tripwise_core::config::{ConfigOverrides, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "tripwise",
    about = "Conversational travel assistant",
    long_about = "Search flights and hotels and get sightseeing ideas in plain language. \
                  Runs an interactive chat when no subcommand is given.",
    after_help = "Examples:\n  tripwise\n  tripwise ask \"flight to Paris tomorrow\"\n  tripwise doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Read configuration from this file instead of tripwise.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the language model")]
    model: Option<String>,
    #[arg(long, global = true, help = "Override how many turns the conversation remembers")]
    max_turns: Option<usize>,
    #[arg(long, global = true, help = "Override the log level (written to stderr)")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive conversation (default)")]
    Chat,
    #[command(about = "Answer a single request and exit")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "The request, e.g. \"hotel in Rome for 3 nights\"")]
        utterance: Vec<String>,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Validate config, credentials, prompt templates and client wiring")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config.clone(),
            overrides: ConfigOverrides {
                llm_model: self.model.clone(),
                max_turns: self.max_turns,
                log_level: self.log_level.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn run() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => commands::chat::run(options),
        Command::Ask { utterance } => commands::ask::run(options, &utterance.join(" ")),
        Command::Config => commands::config::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn no_subcommand_means_chat() {
        let cli = Cli::parse_from(["tripwise"]);
        assert!(cli.command.is_none());
        assert!(!cli.load_options().require_file);
    }

    #[test]
    fn ask_joins_words_and_flags_become_overrides() {
        let cli = Cli::parse_from([
            "tripwise",
            "ask",
            "--max-turns",
            "5",
            "--config",
            "custom.toml",
            "hotel",
            "in",
            "Rome",
        ]);
        let options = cli.load_options();
        assert_eq!(options.overrides.max_turns, Some(5));
        assert!(options.require_file);

        match cli.command {
            Some(Command::Ask { utterance }) => assert_eq!(utterance.join(" "), "hotel in Rome"),
            other => panic!("expected ask, got {other:?}"),
        }
    }
}
