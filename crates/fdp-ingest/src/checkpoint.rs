//! Durable record of fully-ingested tables
//!
//! The checkpoint lives at the destination root and maps table names to
//! completion records. Membership is what resumability reads; the rest of
//! each record is provenance for operators diffing two runs. A table is
//! marked only after its whole snapshot merged, and the mark is persisted
//! synchronously so a crash can never leave a phantom completion.

use crate::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use fdp_common::checksum::Checksum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name of the checkpoint, directly under the destination root
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Completion record for one table's latest snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Snapshot file name that was merged
    pub snapshot: String,
    /// Date token of that snapshot
    pub effective_date: String,
    /// Data rows read, including excluded ones
    pub rows: u64,
    /// Digest of the compressed snapshot bytes
    pub checksum: Checksum,
    /// When the table finished
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct CheckpointState(BTreeMap<String, CheckpointEntry>);

/// Mutex-guarded checkpoint store shared by all workers
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: Mutex<CheckpointState>,
}

impl CheckpointStore {
    /// Open the checkpoint under `dest_root`, starting empty when absent
    pub fn open(dest_root: &Path) -> Result<Self> {
        let path = dest_root.join(CHECKPOINT_FILE);
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckpointState::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Whether a table completed in this or any earlier run
    pub fn is_processed(&self, table: &str) -> bool {
        self.lock().0.contains_key(table)
    }

    pub fn entry(&self, table: &str) -> Option<CheckpointEntry> {
        self.lock().0.get(table).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().0.is_empty()
    }

    /// Record a completion and persist it before returning.
    ///
    /// The file is replaced through a sibling temp file and a rename, so a
    /// crash mid-write can never corrupt marks committed by earlier tables.
    pub fn mark_processed(&self, table: &str, entry: CheckpointEntry) -> Result<()> {
        let mut state = self.lock();
        state.0.insert(table.to_string(), entry);
        let content = serde_json::to_string_pretty(&*state)?;
        let staged = self.path.with_extension("json.tmp");
        std::fs::write(&staged, content)
            .map_err(|e| IngestError::persistence("checkpoint", &staged, e))?;
        std::fs::rename(&staged, &self.path)
            .map_err(|e| IngestError::persistence("checkpoint", &self.path, e))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CheckpointState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
