//! Fake Account Detector CLI
//!
//! A command-line tool for scoring accounts, retraining the model and
//! checking a running detector service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{account, model};

/// Fake Account Detector CLI
#[derive(Parser)]
#[command(name = "fad")]
#[command(author, version, about = "CLI for the Fake Account Detector", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via FAD_API_URL env var)
    #[arg(long, env = "FAD_API_URL")]
    pub api_url: Option<String>,

    /// Output format [default: table]
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show service and model health
    Health,

    /// Predict whether an account is fake
    Predict(account::AccountArgs),

    /// Retrain the model on the service
    Train,

    /// Show model metadata, evaluation and feature importances
    Info,

    /// Run health, a sample prediction and model info against the service
    Smoke,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = config::Config::load()?;
    let api_url = file_config.resolve_api_url(cli.api_url);
    let format = file_config.resolve_format(cli.format);

    if cli.verbose {
        eprintln!("Using API at {}", api_url);
    }

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Health => model::health(&client, format).await?,
        Commands::Predict(args) => account::predict(&client, &args, format).await?,
        Commands::Train => model::train(&client, format).await?,
        Commands::Info => model::info(&client, format).await?,
        Commands::Smoke => account::smoke(&client, format).await?,
    }

    Ok(())
}
