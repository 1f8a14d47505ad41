//! Run orchestration: worker pool, per-table streaming, checkpointing
//!
//! A run loads the schema manifest and table selection, drops tables that
//! are skipped or already checkpointed, and hands the rest to a pool of
//! blocking workers claiming from a shared queue. Each worker streams one
//! compressed snapshot at a time through the merge engine and checkpoints
//! the table before claiming the next. A failed table aborts only itself;
//! the run finishes the rest, then reports the failure.

use crate::checkpoint::{CheckpointEntry, CheckpointStore};
use crate::document::DocumentStore;
use crate::error::{IngestError, Result};
use crate::mismatch::MismatchLog;
use crate::progress::file_progress;
use crate::schema::{ColumnSchema, SchemaFile};
use crate::selection::TableSelection;
use crate::snapshot::latest_snapshot;
use chrono::Utc;
use fdp_common::checksum::Checksum;
use flate2::read::GzDecoder;
use indicatif::MultiProgress;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Rows between progress bar updates
const PROGRESS_EVERY: u64 = 1000;

/// Everything a run needs, resolved from the CLI
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the snapshot source tree, one subdirectory per table
    pub source_root: PathBuf,
    /// Destination root for the asset document store
    pub asset_dest: PathBuf,
    /// Destination root reserved for the company pipeline
    pub company_dest: PathBuf,
    /// Path to the schema manifest
    pub metadata_path: PathBuf,
    /// Path to the table selection file
    pub selection_path: PathBuf,
    /// Record per-property history alongside documents
    pub history: bool,
    /// Leading tables to drop from the selection before checkpoint filtering
    pub skip: usize,
    /// Worker count; defaults to available parallelism
    pub workers: Option<usize>,
    /// Identifier column name
    pub id_column: String,
    /// Required identifier prefix
    pub id_prefix: String,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.source_root.is_dir() {
            return Err(IngestError::config(format!(
                "Source directory '{}' does not exist",
                self.source_root.display()
            )));
        }
        if self.id_column.is_empty() {
            return Err(IngestError::config(
                "Identifier column name must not be empty",
            ));
        }
        Ok(())
    }
}

/// Aggregate counts for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Tables in the asset selection
    pub tables_eligible: usize,
    /// Tables dropped by the skip count
    pub tables_skipped: usize,
    /// Tables dropped because an earlier run checkpointed them
    pub tables_resumed: usize,
    /// Tables fully ingested by this run
    pub tables_ingested: usize,
    /// Tables that aborted
    pub tables_failed: usize,
    /// Rows merged into documents
    pub rows_merged: u64,
    /// Rows excluded by the identifier gate
    pub rows_excluded: u64,
    /// Declared-type fallbacks across all rows
    pub fallbacks: u64,
    pub duration_secs: f64,
}

/// Per-table result produced by a worker
struct FileReport {
    snapshot: String,
    effective_date: String,
    rows_merged: u64,
    rows_excluded: u64,
    fallbacks: u64,
    checksum: Checksum,
}

#[derive(Default)]
struct WorkerReport {
    completed: Vec<FileReport>,
    failures: Vec<(String, IngestError)>,
}

/// State shared by every worker for the duration of one run
struct WorkerContext {
    config: PipelineConfig,
    schema: SchemaFile,
    store: DocumentStore,
    checkpoint: CheckpointStore,
    mismatches: MismatchLog,
    queue: Mutex<VecDeque<String>>,
    progress: MultiProgress,
}

/// Execute one ingestion run to completion.
///
/// Returns the aggregate summary on success. On failure the first error is
/// returned after every worker has drained; tables that completed stay
/// checkpointed, and the schema manifest is left untouched.
pub async fn run(config: PipelineConfig) -> Result<RunSummary> {
    config.validate()?;
    let started = std::time::Instant::now();

    let schema = SchemaFile::load(&config.metadata_path)
        .map_err(|e| missing_input(e, "Schema manifest", &config.metadata_path))?;
    let selection = TableSelection::load(&config.selection_path)
        .map_err(|e| missing_input(e, "Table selection", &config.selection_path))?;

    info!(
        asset_tables = selection.asset_files.len(),
        company_tables = selection.company_files.len(),
        exceptions = selection.exceptions.len(),
        "Loaded table selection"
    );
    if !selection.company_files.is_empty() {
        debug!(
            dest = %config.company_dest.display(),
            "Company tables are reserved for the company pipeline and not ingested here"
        );
    }

    std::fs::create_dir_all(&config.asset_dest)
        .map_err(|e| IngestError::persistence("document store root", &config.asset_dest, e))?;
    let checkpoint = CheckpointStore::open(&config.asset_dest)?;

    let mut summary = RunSummary {
        tables_eligible: selection.asset_files.len(),
        ..Default::default()
    };

    let mut queue = VecDeque::new();
    for (position, table) in selection.asset_files.iter().enumerate() {
        if position < config.skip {
            info!(table = %table, position = position + 1, "Skipping table before run start");
            summary.tables_skipped += 1;
            continue;
        }
        if checkpoint.is_processed(table) {
            info!(table = %table, "Table already ingested, resuming past it");
            summary.tables_resumed += 1;
            continue;
        }
        queue.push_back(table.clone());
    }

    if queue.is_empty() {
        info!("Nothing to ingest; every selected table is checkpointed or skipped");
        summary.duration_secs = started.elapsed().as_secs_f64();
        return Ok(summary);
    }

    let workers = worker_count(config.workers, queue.len());
    info!(workers, queued = queue.len(), "Starting ingestion workers");

    let context = Arc::new(WorkerContext {
        store: DocumentStore::new(&config.asset_dest, &config.id_column, &config.id_prefix),
        schema,
        checkpoint,
        mismatches: MismatchLog::new(),
        queue: Mutex::new(queue),
        progress: MultiProgress::new(),
        config,
    });

    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let context = Arc::clone(&context);
        let handle = tokio::task::spawn_blocking(move || worker_loop(worker, &context));
        handles.push(handle);
    }

    let mut failures: Vec<(String, IngestError)> = Vec::new();
    for (worker, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(report)) => {
                debug!(
                    worker,
                    completed = report.completed.len(),
                    failed = report.failures.len(),
                    "Worker finished"
                );
                for file in report.completed {
                    summary.tables_ingested += 1;
                    summary.rows_merged += file.rows_merged;
                    summary.rows_excluded += file.rows_excluded;
                    summary.fallbacks += file.fallbacks;
                }
                failures.extend(report.failures);
            }
            Ok(Err(e)) => {
                error!(worker, error = %e, "Worker aborted");
                failures.push((format!("worker {worker}"), e));
            }
            Err(e) => {
                error!(worker, error = %e, "Worker panicked");
                failures.push((format!("worker {worker}"), IngestError::WorkerPanic(worker)));
            }
        }
    }

    summary.tables_failed = failures.len();
    summary.duration_secs = started.elapsed().as_secs_f64();

    info!(
        ingested = summary.tables_ingested,
        resumed = summary.tables_resumed,
        skipped = summary.tables_skipped,
        failed = summary.tables_failed,
        rows_merged = summary.rows_merged,
        rows_excluded = summary.rows_excluded,
        fallbacks = summary.fallbacks,
        duration_secs = summary.duration_secs,
        "Ingestion run finished"
    );

    if let Some((scope, first)) = failures.into_iter().next() {
        error!(
            scope = %scope,
            "Run failed; completed tables stay checkpointed and the next run resumes past them"
        );
        return Err(first);
    }

    // Only a fully clean run may rewrite declared types, otherwise a failed
    // table could re-run against a manifest that no longer matches its data.
    if !context.mismatches.is_empty() {
        let mut corrected = context.schema.clone();
        let rewritten = context.mismatches.apply(&mut corrected);
        if rewritten > 0 {
            corrected.save(&context.config.metadata_path)?;
            info!(
                columns = rewritten,
                path = %context.config.metadata_path.display(),
                "Schema manifest updated with observed column types"
            );
        }
    }

    Ok(summary)
}

fn worker_loop(worker: usize, context: &WorkerContext) -> Result<WorkerReport> {
    let mut report = WorkerReport::default();
    loop {
        let claimed = {
            let mut queue = lock_queue(&context.queue);
            queue.pop_front()
        };
        let Some(table) = claimed else {
            debug!(worker, "No tables left to claim");
            break;
        };

        info!(worker, table = %table, "Processing table");
        match process_table(context, &table) {
            Ok(file) => {
                // Checkpoint persistence failing means every later mark would
                // fail too, so the worker stops instead of burning the queue.
                context.checkpoint.mark_processed(
                    &table,
                    CheckpointEntry {
                        snapshot: file.snapshot.clone(),
                        effective_date: file.effective_date.clone(),
                        rows: file.rows_merged + file.rows_excluded,
                        checksum: file.checksum.clone(),
                        completed_at: Utc::now(),
                    },
                )?;
                info!(
                    worker,
                    table = %table,
                    rows = file.rows_merged + file.rows_excluded,
                    "Table completed"
                );
                report.completed.push(file);
            }
            Err(e) => {
                error!(worker, table = %table, error = %e, "Table failed");
                report.failures.push((table, e));
            }
        }
    }
    Ok(report)
}

fn process_table(context: &WorkerContext, table: &str) -> Result<FileReport> {
    let started = std::time::Instant::now();
    let config = &context.config;

    let snapshot = latest_snapshot(&config.source_root, table)?;
    let table_schema = context
        .schema
        .table(table)
        .ok_or_else(|| IngestError::SchemaMissing(table.to_string()))?;

    let expected_rows = table_schema.row_count;
    if expected_rows == 0 {
        warn!(table = %table, "Schema manifest has no expected row count; progress will be unsized");
    }
    info!(
        table = %table,
        snapshot = %snapshot.file_name,
        effective_date = %snapshot.effective_date,
        expected_rows,
        "Selected latest snapshot"
    );

    let file = std::fs::File::open(&snapshot.path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = csv::Reader::from_reader(decoder);

    let csv_error = |e: csv::Error| IngestError::Csv {
        file: snapshot.file_name.clone(),
        source: e,
    };

    let header = reader.headers().map_err(&csv_error)?.clone();
    if header.is_empty() {
        warn!(table = %table, snapshot = %snapshot.file_name, "Snapshot is empty; marking complete with no rows");
        let checksum = Checksum::from_file(&snapshot.path)?;
        return Ok(FileReport {
            snapshot: snapshot.file_name,
            effective_date: snapshot.effective_date,
            rows_merged: 0,
            rows_excluded: 0,
            fallbacks: 0,
            checksum,
        });
    }

    let id_index = header
        .iter()
        .position(|name| name == config.id_column)
        .ok_or_else(|| IngestError::IdentifierColumnMissing {
            column: config.id_column.clone(),
            file: snapshot.file_name.clone(),
        })?;

    let columns: Vec<Option<&ColumnSchema>> = header
        .iter()
        .map(|name| table_schema.column(name))
        .collect();
    let unmapped = columns.iter().filter(|column| column.is_none()).count();
    if unmapped > 0 {
        debug!(table = %table, columns = unmapped, "Header columns absent from the schema are ignored");
    }

    let bar = file_progress(
        &context.progress,
        expected_rows,
        &format!("{table} / {}", snapshot.file_name),
    );

    let mut rows_merged = 0u64;
    let mut rows_excluded = 0u64;
    let mut fallbacks = 0u64;
    let mut row_count = 0u64;
    let mut record = csv::StringRecord::new();

    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                bar.abandon_with_message(format!("{table}: aborted"));
                return Err(csv_error(e));
            }
        }

        let identifier = record.get(id_index).unwrap_or("");
        let merge = context.store.merge_row(
            identifier,
            columns
                .iter()
                .zip(record.iter())
                .filter_map(|(column, raw)| column.map(|c| (c, raw))),
            &snapshot.file_name,
            &snapshot.effective_date,
            config.history,
            |column, observed| context.mismatches.record(table, column, observed),
        );
        let outcome = match merge {
            Ok(outcome) => outcome,
            Err(e) => {
                bar.abandon_with_message(format!("{table}: aborted"));
                return Err(e);
            }
        };

        if outcome.merged {
            rows_merged += 1;
        } else {
            rows_excluded += 1;
        }
        fallbacks += outcome.fallbacks as u64;

        row_count += 1;
        if row_count % PROGRESS_EVERY == 0 {
            bar.set_position(row_count);
        }
    }

    bar.set_position(row_count);
    bar.finish_with_message(format!(
        "{table}: {row_count} rows in {:.1}s",
        started.elapsed().as_secs_f64()
    ));

    let checksum = Checksum::from_file(&snapshot.path)?;
    info!(
        table = %table,
        rows = row_count,
        merged = rows_merged,
        excluded = rows_excluded,
        fallbacks,
        duration_secs = started.elapsed().as_secs_f64(),
        "Completed snapshot merge"
    );

    Ok(FileReport {
        snapshot: snapshot.file_name,
        effective_date: snapshot.effective_date,
        rows_merged,
        rows_excluded,
        fallbacks,
        checksum,
    })
}

fn worker_count(requested: Option<usize>, queued: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.unwrap_or(available).clamp(1, queued.max(1))
}

fn lock_queue(queue: &Mutex<VecDeque<String>>) -> std::sync::MutexGuard<'_, VecDeque<String>> {
    match queue.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn missing_input(error: IngestError, what: &str, path: &Path) -> IngestError {
    match error {
        IngestError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
            IngestError::config(format!("{what} not found at '{}'", path.display()))
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(source: &Path, dest: &Path) -> PipelineConfig {
        PipelineConfig {
            source_root: source.to_path_buf(),
            asset_dest: dest.join("assets"),
            company_dest: dest.join("companies"),
            metadata_path: source.join("metadata.json"),
            selection_path: source.join("analysis.json"),
            history: false,
            skip: 0,
            workers: Some(1),
            id_column: "ID_BB_GLOBAL".to_string(),
            id_prefix: "BBG".to_string(),
        }
    }

    #[test]
    fn test_worker_count_bounds() {
        assert!(worker_count(None, 4) >= 1);
        assert_eq!(worker_count(Some(8), 3), 3);
        assert_eq!(worker_count(Some(2), 10), 2);
        assert_eq!(worker_count(Some(0), 10), 1);
        assert_eq!(worker_count(Some(5), 0), 1);
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp.path().join("nope"), tmp.path());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_validate_rejects_empty_id_column() {
        let tmp = TempDir::new().unwrap();
        let mut config = config(tmp.path(), tmp.path());
        config.id_column.clear();
        assert!(matches!(
            config.validate().unwrap_err(),
            IngestError::Config(_)
        ));
    }

    #[tokio::test]
    async fn test_run_reports_missing_schema_manifest() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path(), tmp.path());

        let err = run(config).await.unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
        assert!(err.to_string().contains("Schema manifest"));
    }

    #[tokio::test]
    async fn test_run_reports_missing_selection() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path(), tmp.path());
        std::fs::write(&config.metadata_path, "[]").unwrap();

        let err = run(config).await.unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
        assert!(err.to_string().contains("Table selection"));
    }

    #[tokio::test]
    async fn test_run_with_empty_selection_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path(), tmp.path());
        std::fs::write(&config.metadata_path, "[]").unwrap();
        std::fs::write(&config.selection_path, r#"{"assetFiles": []}"#).unwrap();

        let summary = run(config).await.unwrap();
        assert_eq!(summary.tables_eligible, 0);
        assert_eq!(summary.tables_ingested, 0);
    }
}
