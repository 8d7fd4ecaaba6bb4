//! Run-scoped audit log.
//!
//! Every sync run accumulates an append-only list of timestamped entries and
//! renders them as the result table at the end of the run. The table is the
//! sole user-visible error surface: a failed run still produces a table whose
//! last row carries the failure.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

/// A single timestamped log entry attributed to the identity running the sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub date: DateTime<Utc>,
    pub user: String,
    pub severity: Severity,
    pub message: String,
}

/// Append-only in-memory run log.
#[derive(Debug)]
pub struct RunLog {
    run_user: String,
    entries: Vec<LogEntry>,
}

/// Column labels for the rendered result table.
pub const TABLE_COLUMNS: [&str; 4] = ["Date", "User", "Type", "Message"];

impl RunLog {
    /// Create an empty log attributed to `run_user`.
    pub fn new(run_user: impl Into<String>) -> Self {
        Self {
            run_user: run_user.into(),
            entries: Vec::new(),
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.entries.push(LogEntry {
            date: Utc::now(),
            user: self.run_user.clone(),
            severity,
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// True if any entry has ERROR severity.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.severity == Severity::Error)
    }

    /// Render the log as `date,user,type,message` rows.
    pub fn to_table(&self) -> Vec<[String; 4]> {
        self.entries
            .iter()
            .map(|e| {
                [
                    e.date.format("%Y-%m-%d %H:%M:%S").to_string(),
                    e.user.clone(),
                    e.severity.as_str().to_string(),
                    e.message.clone(),
                ]
            })
            .collect()
    }

    /// Persist the log to a CSV dataset.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["date", "user", "type", "message"])?;
        for row in self.to_table() {
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_insertion_order() {
        let mut log = RunLog::new("admin");
        log.info("first");
        log.warning("second");
        log.error("third");

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[0].severity, Severity::Info);
        assert_eq!(entries[1].severity, Severity::Warning);
        assert_eq!(entries[2].severity, Severity::Error);
    }

    #[test]
    fn entries_attributed_to_run_user() {
        let mut log = RunLog::new("svc-sync");
        log.info("hello");
        assert_eq!(log.entries()[0].user, "svc-sync");
    }

    #[test]
    fn has_errors_detects_error_entries() {
        let mut log = RunLog::new("admin");
        log.info("ok");
        assert!(!log.has_errors());
        log.error("boom");
        assert!(log.has_errors());
    }

    #[test]
    fn table_rows_match_entries() {
        let mut log = RunLog::new("admin");
        log.info("created user");
        let table = log.to_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0][1], "admin");
        assert_eq!(table[0][2], "INFO");
        assert_eq!(table[0][3], "created user");
    }

    #[test]
    fn csv_export_round_trip() {
        let mut log = RunLog::new("admin");
        log.info("one");
        log.warning("two");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        log.write_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<&str> = reader.headers().unwrap().iter().collect();
        assert_eq!(headers, vec!["date", "user", "type", "message"]);
        let rows: Vec<csv::StringRecord> =
            reader.records().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "INFO");
        assert_eq!(&rows[1][3], "two");
    }
}
