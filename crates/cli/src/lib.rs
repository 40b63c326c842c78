pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use paintquote_core::config::{AppConfig, LoadOptions, LogFormat};
use paintquote_core::ConversationStage;

#[derive(Debug, Parser)]
#[command(
    name = "paintquote",
    about = "Painting quote engine operator CLI",
    long_about = "Replay a conversation transcript against a rate schedule and inspect configuration.",
    after_help = "Examples:\n  paintquote quote --transcript turns.json --rates rates.toml --pretty\n  paintquote config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Explicit path to a paintquote.toml file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Process a transcript and print the engine result as JSON")]
    Quote {
        #[arg(long, help = "JSON array of turns, or a full request object")]
        transcript: PathBuf,
        #[arg(long, help = "Rate schedule as TOML or JSON")]
        rates: PathBuf,
        #[arg(long, help = "JSON stage cursor returned by the previous turn")]
        stage: Option<PathBuf>,
        #[arg(long, value_parser = parse_stage, help = "Reset the conversation to an earlier stage")]
        edit: Option<ConversationStage>,
        #[arg(long, help = "Pretty-print the JSON result")]
        pretty: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

fn parse_stage(raw: &str) -> Result<ConversationStage, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_owned()))
        .map_err(|_| format!("unknown stage `{raw}`"))
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let options = LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };
    if let Ok(config) = AppConfig::load(options) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Quote { transcript, rates, stage, edit, pretty } => {
            commands::quote::run(&commands::quote::QuoteArgs {
                transcript,
                rates,
                stage,
                edit,
                pretty,
                config_path: cli.config,
            })
        }
        Command::Config => commands::config::run(cli.config.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr; stdout carries the command payload.
fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}
