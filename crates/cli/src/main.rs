//! # sens-tool
//!
//! Command-line entry point for capture-sequence containers.
//!
//! Provides:
//! - container inspection, image export and import
//! - colored point clouds from depth frames
//! - codec conversion through the read and write caches
//! - merging of recordings and profile validation

mod cli;
mod commands;
mod shutdown;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{
    run_convert, run_export, run_import, run_info, run_merge, run_point_cloud, run_validate,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "sens-tool starting");

    let result = match cli.command {
        Commands::Info(args) => run_info(&args),
        Commands::Export(args) => run_export(args).await,
        Commands::Import(args) => run_import(args).await,
        Commands::PointCloud(args) => run_point_cloud(&args),
        Commands::Convert(args) => run_convert(args).await,
        Commands::Merge(args) => run_merge(&args),
        Commands::Validate(args) => run_validate(&args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging and metrics based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    observability::init_with_config(
        ObservabilityConfig::for_verbosity(cli.verbose, cli.quiet)
            .with_log_format(cli.log_format.into())
            .with_metrics_port(cli.metrics_port),
    )
}
