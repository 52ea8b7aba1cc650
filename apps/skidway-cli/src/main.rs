//! skidway CLI - scheduled sheet/feature-service ETL
//!
//! One subcommand per skid; the external weekly scheduler invokes a
//! single subcommand per run:
//! - `skidway import` mirrors spreadsheet tabs into the feature service
//! - `skidway export` copies survey responses back into the spreadsheet

use clap::{Parser, Subcommand};

mod commands;
mod error;
mod logging;

use error::CliResult;

/// skidway - sheet/feature-service ETL jobs
#[derive(Parser)]
#[command(name = "skidway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import spreadsheet rows into the feature service
    Import(commands::import::ImportArgs),

    /// Export survey responses into the spreadsheet
    Export(commands::export::ExportArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Import(args) => commands::import::execute(args).await,
        Commands::Export(args) => commands::export::execute(args).await,
    }
}
