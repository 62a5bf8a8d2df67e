use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod provider;
mod util;

use commands::calibrate::CalibrateCommands;
use commands::review::ReviewArgs;
use commands::run::RunArgs;
use commands::trust::TrustCommands;
use provider::ProviderConfig;
use util::{CliConfig, LedgerStore, exit_error};

#[derive(Parser)]
#[command(
    name = "agenttrust",
    version,
    about = "AgentTrust CLI: calibrated confidence, quality review, and trust scores for agent outputs"
)]
struct Cli {
    /// OpenAI-compatible API base URL
    #[arg(long, env = "AGENTTRUST_API_URL", default_value = "https://api.openai.com/v1")]
    api_url: String,

    /// API key sent as a Bearer token (optional for local servers)
    #[arg(long, env = "AGENTTRUST_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model used for answers, sampling, and judging
    #[arg(long, env = "AGENTTRUST_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Directory holding one trust ledger per agent
    #[arg(long, env = "AGENTTRUST_LEDGER_DIR")]
    ledger_dir: Option<PathBuf>,

    /// JSON config file with optional "pipeline" and "trust" sections
    #[arg(long, env = "AGENTTRUST_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate confidence for an answer or claim
    Calibrate {
        #[command(subcommand)]
        command: CalibrateCommands,
    },
    /// Score an output against the 8-dimension rubric
    Review(ReviewArgs),
    /// Print the rubric dimensions and their scoring guides
    Rubric,
    /// Inspect and update per-agent trust ledgers
    Trust {
        #[command(subcommand)]
        command: TrustCommands,
    },
    /// Run a query through the trust-gated pipeline against the configured model
    Run(RunArgs),
}

/// Resolved settings shared by every command.
pub struct Context {
    pub provider: ProviderConfig,
    pub ledgers: LedgerStore,
    pub config: CliConfig,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agenttrust=info,agenttrust_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    let config = CliConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        exit_error(
            &e,
            Some("Expected JSON like {\"pipeline\": {\"tier\": 2}, \"trust\": {\"initial\": 0}}"),
        )
    });
    let ctx = Context {
        provider: ProviderConfig {
            api_url: cli.api_url,
            api_key: cli.api_key,
            model: cli.model,
        },
        ledgers: LedgerStore::open(cli.ledger_dir.as_deref()),
        config,
    };

    let code = match cli.command {
        Commands::Calibrate { command } => commands::calibrate::run(&ctx, command).await,
        Commands::Review(args) => commands::review::run(&ctx, args).await,
        Commands::Rubric => commands::review::rubric(),
        Commands::Trust { command } => commands::trust::run(&ctx, command),
        Commands::Run(args) => commands::run::run(&ctx, args).await,
    };
    std::process::exit(code);
}
