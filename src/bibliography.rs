//! Entry extraction from BibTeX files.
//!
//! Reduces every record of a bibliography to an `(id, title)` pair, keeping
//! the file order. Records without a title are skipped; records without a
//! citation key get a positional fallback id.

use crate::error::{CiteError, Result};
use biblatex::{Bibliography, ChunksExt};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Prefix of the synthesized id for records lacking a citation key
pub const FALLBACK_ID_PREFIX: &str = "article_";

/// One bibliographic record reduced to what the lookup needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Citation key, or `article_<index>` when the record had none
    pub id: String,
    /// Title as written in the source file
    pub title: String,
}

/// Raw record as produced by the BibTeX parser, before filtering
#[derive(Debug, Clone, Default)]
pub struct BibRecord {
    pub key: Option<String>,
    pub title: Option<String>,
}

/// Read `path` and return its entries in file order.
///
/// # Errors
///
/// Returns `CiteError::SourceRead` if the file cannot be read or is not
/// valid BibTeX.
pub fn extract_entries(path: &Path) -> Result<Vec<Entry>> {
    let source = std::fs::read_to_string(path).map_err(|e| CiteError::SourceRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let records = parse_records(&source).map_err(|e| match e {
        CiteError::Parse(message) => CiteError::SourceRead {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })?;

    let total = records.len();
    let entries = entries_from_records(records);
    info!(
        path = %path.display(),
        records = total,
        entries = entries.len(),
        "Loaded bibliography"
    );
    Ok(entries)
}

/// Parse BibTeX source into raw records.
pub fn parse_records(source: &str) -> Result<Vec<BibRecord>> {
    let bibliography =
        Bibliography::parse(source).map_err(|e| CiteError::Parse(e.to_string()))?;

    Ok(bibliography
        .iter()
        .map(|entry| BibRecord {
            key: Some(entry.key.clone()),
            title: entry.get("title").map(|chunks| chunks.format_verbatim()),
        })
        .collect())
}

/// Turn raw records into entries.
///
/// The fallback id uses the record's position among *all* records, so the
/// numbering does not shift when untitled records are dropped. A fallback
/// that clashes with an explicit key gets a `_<n>` suffix.
pub fn entries_from_records<I>(records: I) -> Vec<Entry>
where
    I: IntoIterator<Item = BibRecord>,
{
    let records: Vec<BibRecord> = records.into_iter().collect();
    let explicit: HashSet<String> = records
        .iter()
        .filter_map(|r| r.key.as_deref().map(str::trim))
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();

    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let title = match record.title.map(|t| t.trim().to_string()) {
                Some(t) if !t.is_empty() => t,
                _ => {
                    debug!(index, key = ?record.key, "Skipping record without title");
                    return None;
                }
            };

            let id = record
                .key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| fallback_id(index, &explicit));

            Some(Entry { id, title })
        })
        .collect()
}

fn fallback_id(index: usize, taken: &HashSet<String>) -> String {
    let base = format!("{}{}", FALLBACK_ID_PREFIX, index);
    if !taken.contains(&base) {
        return base;
    }
    let id = (1..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.clone());
    warn!(index, fallback = %base, id = %id, "Fallback id clashes with a citation key");
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(key: Option<&str>, title: Option<&str>) -> BibRecord {
        BibRecord {
            key: key.map(str::to_string),
            title: title.map(str::to_string),
        }
    }

    #[test]
    fn test_fallback_id_uses_record_position() {
        let entries = entries_from_records(vec![
            record(Some("paper1"), Some("Deep Learning")),
            record(None, Some("Graph Theory")),
        ]);
        assert_eq!(
            entries,
            vec![
                Entry {
                    id: "paper1".to_string(),
                    title: "Deep Learning".to_string()
                },
                Entry {
                    id: "article_1".to_string(),
                    title: "Graph Theory".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_untitled_records_keep_numbering_stable() {
        let records = vec![
            record(None, None),
            record(Some("x"), Some("   ")),
            record(None, Some("Third")),
            record(Some(""), Some("Fourth")),
        ];
        let entries = entries_from_records(records.clone());
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["article_2", "article_3"]);

        // Same input, same ids
        assert_eq!(entries_from_records(records), entries);
    }

    #[test]
    fn test_fallback_id_avoids_explicit_keys() {
        let entries = entries_from_records(vec![
            record(Some("article_1"), Some("Explicit")),
            record(None, Some("Keyless")),
            record(Some("article_1_1"), Some("Also explicit")),
        ]);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["article_1", "article_1_2", "article_1_1"]);
    }

    #[test]
    fn test_extract_entries_from_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"
@article{{paper1,
  title = {{Deep Learning}},
  author = {{LeCun, Yann and Bengio, Yoshua and Hinton, Geoffrey}},
  year = {{2015}}
}}

@misc{{,
  title = {{Graph Theory}}
}}

@misc{{notitle,
  author = {{Nobody}}
}}

@inproceedings{{networks,
  title = {{Network Science}},
  year = {{2016}}
}}
"#
        )?;

        let entries = extract_entries(file.path())?;
        let pairs: Vec<(&str, &str)> = entries
            .iter()
            .map(|e| (e.id.as_str(), e.title.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("paper1", "Deep Learning"),
                ("article_1", "Graph Theory"),
                ("networks", "Network Science"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_duplicate_keys_reject_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            "@misc{{a, title = {{First}}}}\n@misc{{a, title = {{Second}}}}\n"
        )?;
        let err = extract_entries(file.path()).expect_err("duplicate keys must fail");
        assert!(matches!(err, CiteError::SourceRead { .. }));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_source_error() {
        let err = extract_entries(Path::new("/nonexistent/input.bib"))
            .expect_err("missing file must fail");
        assert!(matches!(err, CiteError::SourceRead { .. }));
    }
}
