//! FDP Ingest - snapshot ingestion binary

use anyhow::Result;
use clap::Parser;
use fdp_common::logging::{init_logging, LogConfig, LogLevel};
use fdp_ingest::pipeline::{self, PipelineConfig};
use fdp_ingest::{Cli, Commands};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let mut log_config = LogConfig::builder()
        .level(log_level)
        .file_prefix("fdp-ingest")
        .build();
    log_config.apply_env()?;
    init_logging(&log_config)?;

    match cli.command {
        Commands::Assets {
            source,
            asset_dest,
            company_dest,
            metadata,
            analysis,
            history,
            skip,
            workers,
            id_column,
            id_prefix,
        } => {
            info!(source = %source.display(), "Ingesting asset snapshots");
            let config = PipelineConfig {
                source_root: source,
                asset_dest,
                company_dest,
                metadata_path: metadata,
                selection_path: analysis,
                history,
                skip,
                workers,
                id_column,
                id_prefix,
            };
            let summary = pipeline::run(config).await?;
            info!(
                tables = summary.tables_ingested,
                rows = summary.rows_merged,
                "Ingestion complete"
            );
        }
    }

    Ok(())
}
