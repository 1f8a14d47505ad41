//! Observed type mismatches and end-of-run schema correction
//!
//! Workers report every declared-type fallback here, keyed by table and
//! column. After a fully clean run the accumulated observations are folded
//! back into the schema manifest so the next run coerces those columns
//! directly instead of falling back row by row.

use crate::schema::{DataType, SchemaFile};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::info;

/// Thread-safe accumulator of observed column types
#[derive(Debug, Default)]
pub struct MismatchLog {
    entries: Mutex<BTreeMap<String, BTreeMap<String, DataType>>>,
}

impl MismatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `table.column` was observed as `observed`.
    /// Later observations for the same column overwrite earlier ones.
    pub fn record(&self, table: &str, column: &str, observed: DataType) {
        let mut entries = self.lock();
        entries
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), observed);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total number of (table, column) observations
    pub fn len(&self) -> usize {
        self.lock().values().map(|columns| columns.len()).sum()
    }

    /// Rewrite declared types in the schema to the observed ones.
    ///
    /// Tables and columns the schema does not know are ignored. Returns the
    /// number of columns rewritten.
    pub fn apply(&self, schema: &mut SchemaFile) -> usize {
        let entries = self.lock();
        let mut corrected = 0;

        for (table, columns) in entries.iter() {
            let Some(table_schema) = schema.table_mut(table) else {
                continue;
            };
            for (column, observed) in columns {
                if let Some(column_schema) =
                    table_schema.columns.iter_mut().find(|c| &c.name == column)
                {
                    info!(
                        table = %table,
                        column = %column,
                        from = %column_schema.data_type,
                        to = %observed,
                        "Correcting declared column type"
                    );
                    column_schema.data_type = observed.clone();
                    corrected += 1;
                }
            }
        }

        corrected
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, DataType>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
