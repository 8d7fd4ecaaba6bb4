//! Group mapping table — which Entra ID group feeds which Quill group, and
//! the license that membership grants.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{QuillError, Result};
use crate::license::License;

/// Expected CSV header, in fixed column order.
const MAPPING_COLUMNS: [&str; 3] = ["quill_name", "entra_name", "license"];

/// One row of the group mapping dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMapping {
    /// Workbench group name (unique within the table).
    pub quill_name: String,
    /// Entra ID group display name queried for members.
    pub entra_name: String,
    /// License granted by membership of this group.
    pub license: License,
}

#[derive(Debug, Deserialize)]
struct MappingCsvRow {
    quill_name: String,
    entra_name: String,
    license: String,
}

/// The full group mapping table, immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct MappingTable {
    rows: Vec<GroupMapping>,
}

impl MappingTable {
    /// Build a table from pre-parsed rows, enforcing `quill_name` uniqueness.
    pub fn new(rows: Vec<GroupMapping>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for row in &rows {
            if !seen.insert(row.quill_name.as_str()) {
                return Err(QuillError::Config(format!(
                    "duplicate quill_name {:?} in group mapping",
                    row.quill_name
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Read the mapping from a CSV file.
    ///
    /// The file must carry exactly the columns `quill_name,entra_name,license`
    /// in that order; license values are restricted to the enumerated tiers.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;

        let headers: Vec<&str> = reader.headers()?.iter().collect();
        if headers != MAPPING_COLUMNS {
            return Err(QuillError::Config(format!(
                "the group mapping dataset is not correctly configured: expected columns {:?}, found {:?}",
                MAPPING_COLUMNS, headers
            )));
        }

        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let raw: MappingCsvRow = record?;
            rows.push(GroupMapping {
                quill_name: raw.quill_name,
                entra_name: raw.entra_name,
                license: raw.license.parse()?,
            });
        }
        Self::new(rows)
    }

    /// Rows in file order.
    pub fn rows(&self) -> &[GroupMapping] {
        &self.rows
    }

    /// License granted by membership of the given workbench group.
    pub fn license_for(&self, quill_name: &str) -> Option<License> {
        self.rows
            .iter()
            .find(|r| r.quill_name == quill_name)
            .map(|r| r.license)
    }

    /// The set of workbench group names managed by this table.
    pub fn quill_names(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.quill_name.as_str()).collect()
    }
}
