//! psytest CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "psytest", version, about = "Timed psychometric test runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a test interactively
    Take {
        /// Test id
        #[arg(long)]
        test: String,

        /// Sampling seed, for a reproducible question selection
        #[arg(long)]
        seed: Option<u64>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Load question bank files into the configured store
    Import {
        /// Path to a bank .toml file or directory
        #[arg(long)]
        bank: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate question bank TOML files
    Validate {
        /// Path to a bank .toml file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// List the tests available to the configured user
    Tests {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Inspect past attempts
    Results {
        #[command(subcommand)]
        action: ResultsAction,
    },

    /// Create starter config and example question bank
    Init,
}

#[derive(Subcommand)]
enum ResultsAction {
    /// List your attempts, oldest first
    List {
        /// Only attempts of this test
        #[arg(long)]
        test: Option<String>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show one attempt
    Show {
        /// Result id
        id: String,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Also write the result as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Delete one attempt
    Delete {
        /// Result id
        id: String,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Summarize your attempts
    Stats {
        /// Only attempts of this test
        #[arg(long)]
        test: Option<String>,

        /// Output format: text, markdown
        #[arg(long, default_value = "text")]
        format: String,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("psytest=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take { test, seed, config } => commands::take::execute(test, seed, config).await,
        Commands::Import { bank, config } => commands::import::execute(bank, config).await,
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Tests { config } => commands::tests::execute(config).await,
        Commands::Results { action } => match action {
            ResultsAction::List { test, config } => commands::results::list(test, config).await,
            ResultsAction::Show {
                id,
                format,
                output,
                config,
            } => commands::results::show(id, format, output, config).await,
            ResultsAction::Delete { id, config } => commands::results::delete(id, config).await,
            ResultsAction::Stats {
                test,
                format,
                config,
            } => commands::results::stats(test, format, config).await,
        },
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
