//! Entity documents and the merge engine
//!
//! Each accepted identifier owns one directory in a two-level sharded tree
//! under the destination root, holding its merged `data.json` and, when
//! history is on, its `history.json`. Concurrent workers may merge rows for
//! the same identifier at once; a striped lock serializes the per-entity
//! read-modify-write so late rows always see earlier rows' values.

use crate::error::{IngestError, Result};
use crate::history::{HistoryEntry, PropertyHistory, HISTORY_FILE};
use crate::schema::{ColumnSchema, DataType};
use crate::value::{coerce, Coerced, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// File name of the merged document inside an entity's shard directory
pub const DOCUMENT_FILE: &str = "data.json";

/// Characters per shard bucket level
const BUCKET_WIDTH: usize = 2;

/// Number of lock stripes guarding per-entity read-modify-write cycles
const LOCK_STRIPES: usize = 128;

/// Flat property map for one entity, serialized as a plain JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, FieldValue>);

impl Document {
    pub fn get(&self, property: &str) -> Option<&FieldValue> {
        self.0.get(property)
    }

    pub fn set(&mut self, property: &str, value: FieldValue) {
        self.0.insert(property.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load an existing document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load a document, falling back to a fresh one when the file is absent.
    /// The identifier property is always present afterwards.
    fn load_or_init(path: &Path, id_column: &str, identifier: &str) -> Result<Self> {
        let mut document = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<Self>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        document
            .0
            .entry(id_column.to_string())
            .or_insert_with(|| FieldValue::Text(identifier.to_string()));
        Ok(document)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| IngestError::persistence("document", path, e))
    }
}

/// Result of merging one CSV row
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MergeOutcome {
    /// Whether the row's identifier passed the gate and reached a document
    pub merged: bool,
    /// Values stored from this row
    pub values_written: usize,
    /// Declared-type fallbacks to text in this row
    pub fallbacks: usize,
}

/// Sharded document store rooted at the asset destination directory
#[derive(Debug)]
pub struct DocumentStore {
    root: PathBuf,
    id_column: String,
    id_prefix: String,
    locks: Vec<Mutex<()>>,
}

impl DocumentStore {
    pub fn new(
        root: impl Into<PathBuf>,
        id_column: impl Into<String>,
        id_prefix: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            id_column: id_column.into(),
            id_prefix: id_prefix.into(),
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Shard directory for an identifier: two bucket levels derived from the
    /// characters after the prefix, then the full identifier. Short tails
    /// are padded with underscores so every identifier gets a total path.
    pub fn shard_dir(&self, identifier: &str) -> PathBuf {
        let tail: Vec<char> = identifier
            .chars()
            .skip(self.id_prefix.chars().count())
            .collect();
        self.root
            .join(bucket(&tail, 0))
            .join(bucket(&tail, 1))
            .join(identifier)
    }

    pub fn document_path(&self, identifier: &str) -> PathBuf {
        self.shard_dir(identifier).join(DOCUMENT_FILE)
    }

    pub fn history_path(&self, identifier: &str) -> PathBuf {
        self.shard_dir(identifier).join(HISTORY_FILE)
    }

    fn stripe(&self, identifier: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        identifier.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.locks.len();
        &self.locks[index]
    }

    /// Merge one row into the identified entity's document.
    ///
    /// Rows whose identifier is empty, lacks the required prefix, or carries
    /// a path separator (the identifier names a directory under the store
    /// root, so a separator would address outside the destination tree) are
    /// excluded without touching disk. Null cells are skipped, coercion
    /// fallbacks are reported through `on_fallback`, and unconvertible
    /// cells are logged and dropped while the rest of the row still lands.
    pub fn merge_row<'a, I>(
        &self,
        identifier: &str,
        columns: I,
        source_file: &str,
        effective_date: &str,
        with_history: bool,
        mut on_fallback: impl FnMut(&str, DataType),
    ) -> Result<MergeOutcome>
    where
        I: IntoIterator<Item = (&'a ColumnSchema, &'a str)>,
    {
        if identifier.is_empty()
            || !identifier.starts_with(&self.id_prefix)
            || identifier.contains(['/', '\\'])
        {
            return Ok(MergeOutcome::default());
        }

        let shard = self.shard_dir(identifier);
        let _guard = match self.stripe(identifier).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        std::fs::create_dir_all(&shard)
            .map_err(|e| IngestError::persistence("shard directory", &shard, e))?;

        let document_path = shard.join(DOCUMENT_FILE);
        let mut document = Document::load_or_init(&document_path, &self.id_column, identifier)?;
        let history_path = shard.join(HISTORY_FILE);
        let mut history = if with_history {
            Some(PropertyHistory::load_or_default(&history_path)?)
        } else {
            None
        };

        let mut outcome = MergeOutcome {
            merged: true,
            ..Default::default()
        };

        for (column, raw) in columns {
            match coerce(raw, &column.data_type, &column.name) {
                Ok(Coerced::Null) => continue,
                Ok(Coerced::Value { value, fallback }) => {
                    if let Some(observed) = fallback {
                        debug!(
                            column = %column.name,
                            value = %raw,
                            "Declared type fell back to text"
                        );
                        on_fallback(&column.name, observed);
                        outcome.fallbacks += 1;
                    }
                    if let Some(history) = history.as_mut() {
                        history.record(
                            &column.name,
                            effective_date,
                            HistoryEntry {
                                file: source_file.to_string(),
                                value: value.clone(),
                            },
                        );
                    }
                    document.set(&column.name, value);
                    outcome.values_written += 1;
                }
                Err(e) => {
                    warn!(column = %column.name, error = %e, "Skipping unconvertible value");
                    continue;
                }
            }
        }

        document.save(&document_path)?;
        if let Some(history) = history {
            history.save(&history_path)?;
        }

        Ok(outcome)
    }
}

fn bucket(tail: &[char], level: usize) -> String {
    let mut out = String::with_capacity(BUCKET_WIDTH);
    for i in 0..BUCKET_WIDTH {
        out.push(tail.get(level * BUCKET_WIDTH + i).copied().unwrap_or('_'));
    }
    out
}
