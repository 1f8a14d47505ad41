//! Table selection list: which tables belong to which pipeline
//!
//! A separate classification step sorts source tables into asset tables,
//! company tables, and exceptions. Ingestion only consumes the asset list;
//! the other two are carried so the same file drives every pipeline.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parsed contents of the table selection file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSelection {
    /// Tables ingested into the asset document store, in run order
    #[serde(default)]
    pub asset_files: Vec<String>,
    /// Tables reserved for the company pipeline
    #[serde(default)]
    pub company_files: Vec<String>,
    /// Tables excluded from every pipeline
    #[serde(default)]
    pub exceptions: Vec<String>,
}

impl TableSelection {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_full_selection() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"{
                "assetFiles": ["equity", "bond"],
                "companyFiles": ["issuer"],
                "exceptions": ["scratch"]
            }"#,
        )
        .unwrap();
        file.flush().unwrap();

        let selection = TableSelection::load(file.path()).unwrap();
        assert_eq!(selection.asset_files, vec!["equity", "bond"]);
        assert_eq!(selection.company_files, vec!["issuer"]);
        assert_eq!(selection.exceptions, vec!["scratch"]);
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"assetFiles": ["equity"]}"#).unwrap();
        file.flush().unwrap();

        let selection = TableSelection::load(file.path()).unwrap();
        assert_eq!(selection.asset_files, vec!["equity"]);
        assert!(selection.company_files.is_empty());
        assert!(selection.exceptions.is_empty());
    }
}
