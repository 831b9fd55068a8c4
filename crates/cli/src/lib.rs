pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "tandem",
    about = "Tandem operator CLI",
    long_about = "Operate the tandem co-purchase engine: migrations, demo seeding, purchase \
                  recording, recommendation queries, history reset, and config inspection.",
    after_help = "Examples:\n  tandem migrate\n  tandem record --items 1,2,3\n  tandem recommend --seeds 2 -k 3 --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo catalog and replay its purchase baskets")]
    Seed,
    #[command(about = "Record one completed purchase basket into the association graph")]
    Record {
        #[arg(long, help = "Comma-separated item ids bought together, e.g. 1,2,3")]
        items: String,
    },
    #[command(about = "Query ranked co-purchase recommendations for one or more seed items")]
    Recommend {
        #[arg(long, help = "Comma-separated seed item ids, e.g. 2 or 1,2")]
        seeds: String,
        #[arg(
            short,
            long = "limit",
            help = "Maximum number of recommendations (capped by configuration)"
        )]
        k: Option<usize>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Clear all accumulated co-purchase history")]
    Reset,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Record { items } => commands::record::run(&items),
        Command::Recommend { seeds, k, json } => commands::recommend::run(&seeds, k, json),
        Command::Reset => commands::reset::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
