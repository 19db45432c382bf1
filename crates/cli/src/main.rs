//! helpbot CLI: the main entry point.
//!
//! Commands:
//! - `chat`   : Interactive question/answer loop in the terminal
//! - `slack`  : Answer @-mentions over Slack Socket Mode
//! - `ask`    : Answer a single question and exit
//! - `doctor` : Check configuration and collaborator health

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "helpbot",
    about = "helpbot: answers questions from documentation, issues and chat threads",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ~/.helpbot/config.toml)
    #[arg(short, long, global = true, env = "HELPBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask questions interactively in the terminal
    Chat,

    /// Run the Slack bot (Socket Mode)
    Slack,

    /// Answer one question and exit
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Diagnose configuration and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries answers.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Chat => commands::chat::run(config_path).await?,
        Commands::Slack => commands::slack::run(config_path).await?,
        Commands::Ask { question } => commands::ask::run(config_path, question.join(" ")).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
