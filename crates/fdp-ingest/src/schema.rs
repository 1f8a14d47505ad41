//! Schema manifest: declared column types per source table
//!
//! The manifest is produced by a separate scanning tool and consumed here.
//! Ingestion reads it to drive type coercion and, at the end of a clean run,
//! writes it back with any declared types that observation proved wrong.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Declared type of a column in the schema manifest.
///
/// The coercion engine only distinguishes `Integer`, `Float`, and `Text`.
/// Anything else the scanner emits (dates, booleans) is carried as `Other`
/// and written back verbatim so a manifest rewrite never loses information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Integer,
    Float,
    Text,
    Other(String),
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "integer" => DataType::Integer,
            "float" => DataType::Float,
            "text" => DataType::Text,
            _ => DataType::Other(s),
        }
    }
}

impl From<DataType> for String {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::Integer => "integer".to_string(),
            DataType::Float => "float".to_string(),
            DataType::Text => "text".to_string(),
            DataType::Other(s) => s,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "integer"),
            DataType::Float => write!(f, "float"),
            DataType::Text => write!(f, "text"),
            DataType::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One column in a table schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
}

/// Schema record for one source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Table name; matches the source subdirectory and the selection list
    pub filename: String,
    pub relative_path: String,
    pub effective_date: String,
    /// Expected data rows, used to size progress bars; 0 when unknown
    pub row_count: u64,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// The full schema manifest, serialized as a JSON array of table records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaFile {
    pub tables: Vec<TableSchema>,
}

impl SchemaFile {
    /// Load the manifest from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the manifest back, pretty-printed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| IngestError::persistence("schema manifest", path.as_ref(), e))
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.filename == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableSchema> {
        self.tables.iter_mut().find(|t| t.filename == name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_manifest() -> &'static str {
        r#"[
            {
                "filename": "equity",
                "relativePath": "equity/equity_20240115.csv.gz",
                "effectiveDate": "20240115",
                "rowCount": 2,
                "columns": [
                    {"name": "ID_BB_GLOBAL", "dataType": "text"},
                    {"name": "PX_LAST", "dataType": "float"},
                    {"name": "LISTED_DT", "dataType": "date"}
                ]
            }
        ]"#
    }

    #[test]
    fn test_load_manifest() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(sample_manifest().as_bytes()).unwrap();
        file.flush().unwrap();

        let schema = SchemaFile::load(file.path()).unwrap();
        assert_eq!(schema.tables.len(), 1);

        let table = schema.table("equity").unwrap();
        assert_eq!(table.row_count, 2);
        assert_eq!(
            table.column("PX_LAST").unwrap().data_type,
            DataType::Float
        );
        assert_eq!(
            table.column("LISTED_DT").unwrap().data_type,
            DataType::Other("date".to_string())
        );
        assert!(table.column("MISSING").is_none());
        assert!(schema.table("bond").is_none());
    }

    #[test]
    fn test_save_round_trip_preserves_unknown_types() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(sample_manifest().as_bytes()).unwrap();
        file.flush().unwrap();

        let schema = SchemaFile::load(file.path()).unwrap();
        let out = NamedTempFile::new().unwrap();
        schema.save(out.path()).unwrap();

        let written = std::fs::read_to_string(out.path()).unwrap();
        assert!(written.contains("\"dataType\": \"date\""));

        let reloaded = SchemaFile::load(out.path()).unwrap();
        assert_eq!(reloaded, schema);
    }

    #[test]
    fn test_table_mut_allows_type_rewrite() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(sample_manifest().as_bytes()).unwrap();
        file.flush().unwrap();

        let mut schema = SchemaFile::load(file.path()).unwrap();
        let table = schema.table_mut("equity").unwrap();
        table.columns[1].data_type = DataType::Text;

        assert_eq!(
            schema.table("equity").unwrap().column("PX_LAST").unwrap().data_type,
            DataType::Text
        );
    }

    #[test]
    fn test_data_type_string_round_trip() {
        for raw in ["integer", "float", "text", "date", "boolean"] {
            let parsed = DataType::from(raw.to_string());
            assert_eq!(String::from(parsed.clone()), raw);
            assert_eq!(parsed.to_string(), raw);
        }
        assert_eq!(DataType::from("integer".to_string()), DataType::Integer);
        // Type matching is exact; the scanner always emits lowercase.
        assert_eq!(
            DataType::from("Integer".to_string()),
            DataType::Other("Integer".to_string())
        );
    }
}
