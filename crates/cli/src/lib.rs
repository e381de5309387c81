pub mod commands;
pub mod telemetry;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "arma",
    about = "Conversational Azure Resource Manager assistant",
    long_about = "Translate natural-language requests into ARM operations: template \
                  deployments, resource lookups, listings, and deletions.",
    after_help = "Examples:\n  arma ask --prompt \"create a storage account named testsa in demorg\"\n  arma ask --thread <id> --prompt \"the subscription is Production\"\n  arma templates\n  arma doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one conversation turn against Azure")]
    Ask {
        #[arg(long, help = "The natural-language request")]
        prompt: String,
        #[arg(long, help = "Thread id of a paused conversation to resume")]
        thread: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "List the quickstart template catalog entries")]
    Templates,
    #[command(about = "Validate config, LLM client readiness, and catalog presence")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Ask { prompt, thread } => {
            match commands::ask::run(&prompt, thread.as_deref()).await {
                Ok(output) => {
                    println!("{output}");
                    ExitCode::SUCCESS
                }
                Err(error) => {
                    eprintln!("error: {error:#}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Config => {
            println!("{}", commands::config::run());
            ExitCode::SUCCESS
        }
        Command::Templates => {
            println!("{}", commands::templates::run());
            ExitCode::SUCCESS
        }
        Command::Doctor { json } => {
            println!("{}", commands::doctor::run(json));
            ExitCode::SUCCESS
        }
    }
}
