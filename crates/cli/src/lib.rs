pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use clarity_core::config::{AppConfig, LoadOptions};
use std::process::ExitCode;

use crate::commands::analyze::AnalyzeArgs;

#[derive(Debug, Parser)]
#[command(
    name = "clarity",
    about = "Clarity personal telemetry CLI",
    long_about = "Manage the telemetry store and turn activity, app usage and spending records into insights and recommendations.",
    after_help = "Examples:\n  clarity migrate\n  clarity seed --user demo\n  clarity analyze --user demo --start 2026-03-01 --end 2026-03-31\n  clarity config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Replace a user's telemetry with a deterministic two-week demo dataset")]
    Seed {
        #[arg(long, default_value = "demo", help = "User to seed")]
        user: String,
    },
    #[command(about = "Run the full analysis pipeline for a user and print the stored result")]
    Analyze(AnalyzeArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Config errors are reported by the command itself.
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        logging::init_logging(&config.logging);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed { user } => commands::seed::run(&user),
        Command::Analyze(args) => commands::analyze::run(&args),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
