//! Export command - survey responses into the spreadsheet

use crate::commands::JobContext;
use crate::error::CliResult;
use clap::Args;
use skidway_jobs::Exporter;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the export command
#[derive(Args)]
pub struct ExportArgs {
    /// Path to the run configuration file
    #[arg(long, default_value = "skidway.toml")]
    pub config: PathBuf,

    /// Path to the local secrets file (the deployment mount wins when
    /// present)
    #[arg(long, default_value = "secrets.json")]
    pub secrets: PathBuf,
}

/// Execute the export command
pub async fn execute(args: ExportArgs) -> CliResult<()> {
    let ctx = JobContext::build(&args.config, &args.secrets)?;
    info!(skid = %ctx.config.skid_name, "starting export");

    let exporter = Exporter::new(
        ctx.sheets.clone(),
        ctx.features.clone(),
        ctx.config.export.clone(),
    );
    let summary = exporter.run().await?;
    ctx.report(&summary).await;
    Ok(())
}
