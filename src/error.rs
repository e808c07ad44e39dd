//! Custom error types for scholarcite.
//!
//! Fatal conditions (`SourceRead`, `SessionInit`) stop a run before the first
//! query. Everything raised while querying a single title is caught at the
//! query boundary and recorded as an unresolved citation count.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scholarcite operations.
#[derive(Debug, Error)]
pub enum CiteError {
    /// Bibliography file missing, unreadable or not valid BibTeX
    #[error("cannot read bibliography {}: {message}", .path.display())]
    SourceRead {
        /// File that was being read
        path: PathBuf,
        /// Underlying cause
        message: String,
    },

    /// Browser could not be located or launched
    #[error("cannot start browser session: {0}")]
    SessionInit(String),

    /// Browser automation error on a live session
    #[error("Browser error: {0}")]
    Browser(String),

    /// Result page did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Output table could not be rewritten
    #[error("cannot write results to {}: {message}", .path.display())]
    SinkWrite {
        /// Output file
        path: PathBuf,
        /// Underlying cause
        message: String,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `CiteError`
pub type Result<T> = std::result::Result<T, CiteError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| CiteError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<u32> = None;
        match missing.ok_or_parse("no anchor") {
            Err(CiteError::Parse(msg)) => assert_eq!(msg, "no anchor"),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(Some(3).ok_or_parse("unused").expect("present"), 3);
    }

    #[test]
    fn test_sink_error_names_path() {
        let err = CiteError::SinkWrite {
            path: PathBuf::from("/tmp/out.csv"),
            message: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot write results to /tmp/out.csv: permission denied"
        );
    }
}
