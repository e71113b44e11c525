//! Hostwatch CLI
//!
//! A command-line tool for reading forecasts, anomaly verdicts, alerts
//! and health from a running hostwatch agent.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{alerts, insights, status};
use output::{print_error, OutputFormat};

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Hostwatch CLI
#[derive(Parser)]
#[command(name = "hwatch")]
#[command(author, version, about = "CLI for the hostwatch agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via HOSTWATCH_API_URL or the config file)
    #[arg(long, env = "HOSTWATCH_API_URL")]
    pub api_url: Option<String>,

    /// Output format [default: table]
    #[arg(long, short)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show forecasts, the latest anomaly verdict and a usage summary
    Insights,

    /// Show the alert log and recent anomalies
    Alerts {
        /// Maximum number of alerts to show
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },

    /// Show agent health and readiness
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;

    let api_url = cli
        .api_url
        .or(config.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let format = cli
        .format
        .or_else(|| config.default_format.as_deref().and_then(OutputFormat::from_name))
        .unwrap_or_default();

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Insights => insights::show_insights(&client, format).await?,
        Commands::Alerts { limit } => alerts::show_alerts(&client, limit, format).await?,
        Commands::Status => status::show_status(&client, format).await?,
    }

    Ok(())
}
