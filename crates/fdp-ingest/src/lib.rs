//! # FDP Ingest
//!
//! Merges dated per-table CSV snapshots into sharded entity document
//! stores for the Financial Data Platform.
//!
//! ## Modules
//!
//! - **snapshot**: Latest dated delivery selection per table
//! - **schema** / **selection**: External manifests driving a run
//! - **value**: Null handling and declared-type coercion
//! - **document**: Sharded document store and the row merge engine
//! - **history**: Per-property provenance records
//! - **checkpoint**: Durable resume state, one mark per completed table
//! - **mismatch**: Observed-type accumulation and schema correction
//! - **pipeline**: Worker pool orchestration for one run

pub mod checkpoint;
pub mod document;
pub mod error;
pub mod history;
pub mod mismatch;
pub mod pipeline;
pub mod progress;
pub mod schema;
pub mod selection;
pub mod snapshot;
pub mod value;

pub use error::{IngestError, Result};
pub use pipeline::{run, PipelineConfig, RunSummary};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line interface for the ingestion binary
#[derive(Parser, Debug)]
#[command(name = "fdp-ingest")]
#[command(about = "FDP Ingest - merge dated table snapshots into entity document stores", long_about = None)]
#[command(version)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge the latest asset-table snapshots into the document store
    Assets {
        /// Root of the snapshot source tree (one subdirectory per table)
        #[arg(long)]
        source: PathBuf,

        /// Destination root for the asset document store
        #[arg(long)]
        asset_dest: PathBuf,

        /// Destination root reserved for the company pipeline
        #[arg(long)]
        company_dest: PathBuf,

        /// Path to the schema manifest produced by the table scanner
        #[arg(long, default_value = "metadata.json")]
        metadata: PathBuf,

        /// Path to the table selection file
        #[arg(long, default_value = "analysis.json")]
        analysis: PathBuf,

        /// Record per-property history alongside each document
        #[arg(long)]
        history: bool,

        /// Number of leading tables to skip before checkpoint filtering
        #[arg(long, default_value_t = 0)]
        skip: usize,

        /// Worker count (defaults to available CPU parallelism)
        #[arg(long)]
        workers: Option<usize>,

        /// Identifier column expected in every snapshot header
        #[arg(long, default_value = "ID_BB_GLOBAL")]
        id_column: String,

        /// Required identifier prefix; rows without it are excluded
        #[arg(long, default_value = "BBG")]
        id_prefix: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_assets_command() {
        let cli = Cli::try_parse_from([
            "fdp-ingest",
            "assets",
            "--source",
            "/data/src",
            "--asset-dest",
            "/data/assets",
            "--company-dest",
            "/data/companies",
            "--history",
            "--skip",
            "2",
        ])
        .unwrap();

        let Commands::Assets {
            source,
            metadata,
            analysis,
            history,
            skip,
            workers,
            id_column,
            id_prefix,
            ..
        } = cli.command;

        assert_eq!(source, PathBuf::from("/data/src"));
        assert_eq!(metadata, PathBuf::from("metadata.json"));
        assert_eq!(analysis, PathBuf::from("analysis.json"));
        assert!(history);
        assert_eq!(skip, 2);
        assert_eq!(workers, None);
        assert_eq!(id_column, "ID_BB_GLOBAL");
        assert_eq!(id_prefix, "BBG");
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_requires_source_arguments() {
        assert!(Cli::try_parse_from(["fdp-ingest", "assets"]).is_err());
        assert!(Cli::try_parse_from(["fdp-ingest"]).is_err());
    }
}
