//! Import command - spreadsheet tabs into the feature service

use crate::commands::JobContext;
use crate::error::CliResult;
use clap::Args;
use skidway_jobs::Importer;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the import command
#[derive(Args)]
pub struct ImportArgs {
    /// Path to the run configuration file
    #[arg(long, default_value = "skidway.toml")]
    pub config: PathBuf,

    /// Path to the local secrets file (the deployment mount wins when
    /// present)
    #[arg(long, default_value = "secrets.json")]
    pub secrets: PathBuf,
}

/// Execute the import command
pub async fn execute(args: ImportArgs) -> CliResult<()> {
    let ctx = JobContext::build(&args.config, &args.secrets)?;
    info!(skid = %ctx.config.skid_name, "starting import");

    let importer = Importer::new(
        ctx.sheets.clone(),
        ctx.features.clone(),
        ctx.config.import.clone(),
    );
    let summary = importer.run().await?;
    ctx.report(&summary).await;
    Ok(())
}
