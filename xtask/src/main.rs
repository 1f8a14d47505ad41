//! Build automation tasks for FDP
//!
//! This tool provides various automation tasks for the FDP project, including:
//! - Generating CLI documentation from source code
//! - Future build-related tasks

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for FDP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate CLI documentation in Markdown format
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    // Generate markdown from clap definitions
    let markdown = clap_markdown::help_markdown::<fdp_ingest::Cli>();

    let content = format!(
        r#"---
title: CLI Reference
description: Complete command reference for the FDP ingest tool
---

# FDP Ingest CLI Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

`fdp-ingest` merges the latest dated CSV snapshot of every selected source
table into a sharded per-entity document store, with resumable checkpoints
and optional per-property history.

## Quick Start

```bash
# Merge the latest asset snapshots
fdp-ingest assets \
  --source /data/snapshots \
  --asset-dest /data/store/assets \
  --company-dest /data/store/companies \
  --metadata /data/metadata.json \
  --analysis /data/analysis.json \
  --history

# Resume after a failure: already checkpointed tables are skipped
fdp-ingest assets \
  --source /data/snapshots \
  --asset-dest /data/store/assets \
  --company-dest /data/store/companies
```

## Commands

{}

## Environment Variables

- `LOG_LEVEL` - Logging level (`trace`, `debug`, `info`, `warn`, `error`)
- `LOG_FORMAT` - Log output format (`text` or `json`)
- `LOG_DIR` - When set, logs are also written to daily-rolling files here
- `LOG_FILE_PREFIX` - File name prefix for rolling log files
- `LOG_FILTER` - Extra filter directives (e.g. `fdp_ingest=debug`)

## Data Layout

The destination root holds `checkpoint.json` plus a two-level sharded tree
of entity directories, each with `data.json` and, when `--history` is on,
`history.json`:

```text
assets/
  checkpoint.json
  00/
    0B/
      BBG000BLNNH6/
        data.json
        history.json
```

---

*This documentation is automatically generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    // Create output directory if it doesn't exist
    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
