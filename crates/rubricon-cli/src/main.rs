mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "rubricon", version, about = "Reading diagnostic platform: item banks, scoring, and generated reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the JSON API server
    Serve {
        /// Address to bind, e.g. 127.0.0.1:8570 (defaults to the config value)
        #[arg(long)]
        addr: Option<String>,

        /// Path to config file (defaults to rubricon.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed demo users and a starter item bank before serving
        #[arg(long)]
        seed: bool,
    },

    /// Import an item bank from a CSV file
    Import {
        /// Path to the CSV file
        file: PathBuf,

        /// Path to config file (defaults to rubricon.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write a blank item-bank CSV template
    ExportTemplate {
        /// Output path for the template
        #[arg(long, default_value = "item-bank-template.csv")]
        output: PathBuf,
    },

    /// Export the current item bank to CSV
    ExportItems {
        /// Output path for the CSV
        #[arg(long, default_value = "item-bank.csv")]
        output: PathBuf,

        /// Path to config file (defaults to rubricon.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Score every response on an attempt
    Score {
        /// Attempt id
        attempt: Uuid,

        /// Path to config file (defaults to rubricon.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate the narrative report for an attempt
    Report {
        /// Attempt id
        attempt: Uuid,

        /// Also write the report as a standalone HTML file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Path to config file (defaults to rubricon.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate an item-bank CSV without importing it
    Validate {
        /// Path to the CSV file
        file: PathBuf,
    },

    /// Seed demo users and a starter item bank
    Seed {
        /// Path to config file (defaults to rubricon.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter configuration file
    Init,

    /// List available models from configured providers
    ListModels {
        /// Filter by provider name
        #[arg(long)]
        provider: Option<String>,

        /// Path to config file (defaults to rubricon.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rubricon=info".parse().unwrap())
                .add_directive("rubricon_server=info".parse().unwrap())
                .add_directive("rubricon_jobs=info".parse().unwrap())
                .add_directive("rubricon_store=info".parse().unwrap())
                .add_directive("rubricon_providers=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { addr, config, seed } => commands::serve::execute(addr, config, seed).await,
        Commands::Import { file, config } => commands::import::execute(file, config).await,
        Commands::ExportTemplate { output } => commands::export::execute_template(output),
        Commands::ExportItems { output, config } => commands::export::execute_items(output, config).await,
        Commands::Score { attempt, config } => commands::score::execute(attempt, config).await,
        Commands::Report { attempt, output, config } => {
            commands::report::execute(attempt, output, config).await
        }
        Commands::Validate { file } => commands::validate::execute(file),
        Commands::Seed { config } => commands::seed::execute(config).await,
        Commands::Init => commands::init::execute(),
        Commands::ListModels { provider, config } => commands::list_models::execute(provider, config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
