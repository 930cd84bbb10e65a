//! catalog-sync CLI - Operate the remote catalog synchronization engine
//!
//! This CLI enables operators to:
//! - Dump remote collections as JSON
//! - Import remote categories, products and tables into a local project
//! - Export local categories and products to the remote catalog

use clap::{Parser, Subcommand};

mod commands;
mod error;
mod logging;

use error::CliResult;
use logging::LogFormat;

/// catalog-sync CLI - Remote point-of-sale catalog synchronization
#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a whole remote collection as JSON
    Fetch(commands::fetch::FetchArgs),

    /// Import remote entities into the local catalog
    Reconcile(commands::reconcile::ReconcileArgs),

    /// Export unlinked local entities to the remote catalog
    Export(commands::export::ExportArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, cli.log_format);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Fetch(args) => commands::fetch::execute(args).await,
        Commands::Reconcile(args) => commands::reconcile::execute(args).await,
        Commands::Export(args) => commands::export::execute(args).await,
    }
}
