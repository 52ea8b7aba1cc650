//! Logging setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Initialize tracing output.
///
/// `RUST_LOG` overrides everything; otherwise `--verbose` selects debug
/// for the skidway crates and info elsewhere.
pub fn init(verbose: bool) {
    let default_directives = if verbose {
        "info,skidway_core=debug,skidway_sheets=debug,skidway_features=debug,skidway_jobs=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .init();
}
