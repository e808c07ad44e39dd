//! Citation count extraction from a rendered results page.
//!
//! The matching strategy sits behind [`CitationExtractor`] so the query
//! engine does not depend on Scholar's markup.

use crate::error::{CiteError, OptionExt, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Reduces a results page to a citation count.
pub trait CitationExtractor: Send + Sync {
    /// `Ok(None)` when nothing on the page matches; `Err` when a match
    /// cannot be interpreted.
    fn extract(&self, html: &str) -> Result<Option<u64>>;
}

/// Sums every "Cited by N" link on the page.
///
/// A title often matches several result entries (versions, editions), and
/// their counts are added together.
#[derive(Debug, Clone)]
pub struct CitedByExtractor {
    /// Substring the link target must contain
    pub href_pattern: String,
    /// Text the link must start with
    pub marker: String,
}

impl Default for CitedByExtractor {
    fn default() -> Self {
        Self {
            href_pattern: "/scholar?cites=".to_string(),
            marker: "Cited by".to_string(),
        }
    }
}

impl CitedByExtractor {
    fn anchor_selector(&self) -> Result<Selector> {
        let pattern = self.href_pattern.replace('\\', "\\\\").replace('"', "\\\"");
        Selector::parse(&format!("a[href*=\"{}\"]", pattern))
            .map_err(|e| CiteError::Parse(e.to_string()))
    }

    fn count_in(&self, anchor: ElementRef<'_>) -> Option<Result<u64>> {
        let text = anchor.text().collect::<String>();
        let text = text.trim();
        if !text.starts_with(self.marker.as_str()) {
            return None;
        }

        let digits = text.strip_prefix(self.marker.as_str()).map(str::trim);
        Some(digits.ok_or_parse("cited-by marker vanished").and_then(|d| {
            d.parse::<u64>()
                .map_err(|e| CiteError::Parse(format!("bad citation count '{}': {}", text, e)))
        }))
    }
}

impl CitationExtractor for CitedByExtractor {
    fn extract(&self, html: &str) -> Result<Option<u64>> {
        let document = Html::parse_document(html);
        let selector = self.anchor_selector()?;

        let mut matched = 0usize;
        let mut total: u64 = 0;
        for anchor in document.select(&selector) {
            let Some(count) = self.count_in(anchor) else {
                continue;
            };
            total = total
                .checked_add(count?)
                .ok_or_parse("citation total overflows u64")?;
            matched += 1;
        }

        debug!(matched, total, "Scanned cited-by links");
        Ok((matched > 0).then_some(total))
    }
}
