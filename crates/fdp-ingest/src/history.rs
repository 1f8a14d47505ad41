//! Per-property provenance history, co-located with each document
//!
//! When history is enabled, every stored value also lands in the entity's
//! `history.json`, keyed by property and effective date. Re-ingesting the
//! same snapshot overwrites the same slot, so history never grows from
//! repeat runs of one delivery.

use crate::error::{IngestError, Result};
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// File name of the per-entity history, next to `data.json`
pub const HISTORY_FILE: &str = "history.json";

/// One recorded observation of a property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Snapshot file name the value came from
    pub file: String,
    /// The value as stored in the document at that date
    pub value: FieldValue,
}

/// Property name -> effective date -> observation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyHistory(BTreeMap<String, BTreeMap<String, HistoryEntry>>);

impl PropertyHistory {
    /// Load an entity's history, starting empty when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| IngestError::persistence("history", path, e))
    }

    /// Record an observation, overwriting any prior one for the same
    /// property and effective date
    pub fn record(&mut self, property: &str, effective_date: &str, entry: HistoryEntry) {
        self.0
            .entry(property.to_string())
            .or_default()
            .insert(effective_date.to_string(), entry);
    }

    pub fn entry(&self, property: &str, effective_date: &str) -> Option<&HistoryEntry> {
        self.0.get(property)?.get(effective_date)
    }

    /// All dated observations for one property
    pub fn property(&self, name: &str) -> Option<&BTreeMap<String, HistoryEntry>> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
