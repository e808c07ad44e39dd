//! Incremental CSV output.
//!
//! Results are kept in memory and the whole table is rewritten after every
//! entry. The new table goes to a sibling temp file that is then renamed
//! over the output, so the file on disk is always a complete table of the
//! entries processed so far.

use crate::bibliography::Entry;
use crate::error::{CiteError, Result};
use crate::query::CitationCount;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Output header row
pub const HEADER: [&str; 3] = ["Article ID", "Title", "Citations"];

/// One processed entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub entry: Entry,
    pub citations: CitationCount,
}

#[derive(Serialize)]
struct Row<'a> {
    id: &'a str,
    title: &'a str,
    citations: CitationCount,
}

/// Append-only result log mirrored to a CSV file.
pub struct ResultSink {
    path: PathBuf,
    log: Vec<QueryResult>,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            log: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn results(&self) -> &[QueryResult] {
        &self.log
    }

    /// Append `result` and rewrite the output file.
    ///
    /// The result stays in the log even when the write fails.
    ///
    /// # Errors
    ///
    /// Returns `CiteError::SinkWrite` if the table cannot be written.
    pub fn record_and_persist(&mut self, result: QueryResult) -> Result<()> {
        self.log.push(result);
        self.persist()
    }

    /// Rewrite the output file from the in-memory log.
    pub fn persist(&self) -> Result<()> {
        let tmp = self.temp_path();
        let written = self.write_table(&tmp).and_then(|()| {
            std::fs::rename(&tmp, &self.path).map_err(|e| e.to_string())
        });

        match written {
            Ok(()) => {
                debug!(path = %self.path.display(), rows = self.log.len(), "Saved results");
                Ok(())
            }
            Err(message) => {
                let _ = std::fs::remove_file(&tmp);
                Err(CiteError::SinkWrite {
                    path: self.path.clone(),
                    message,
                })
            }
        }
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "results.csv".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    fn write_table(&self, path: &Path) -> std::result::Result<(), String> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| e.to_string())?;

        wtr.write_record(HEADER).map_err(|e| e.to_string())?;
        for result in &self.log {
            wtr.serialize(Row {
                id: &result.entry.id,
                title: &result.entry.title,
                citations: result.citations,
            })
            .map_err(|e| e.to_string())?;
        }

        let file = wtr.into_inner().map_err(|e| e.error().to_string())?;
        file.sync_all().map_err(|e| e.to_string())
    }
}
