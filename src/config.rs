//! Run configuration.
//!
//! All knobs are gathered once at startup (CLI flags with environment
//! fallbacks) and handed to each component explicitly.

use crate::bibliography::Entry;
use crate::error::{CiteError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// `name` attribute of the Scholar search box
pub const DEFAULT_SEARCH_INPUT: &str = "q";

/// DOM id of the Scholar CAPTCHA form
pub const DEFAULT_CHALLENGE_MARKER: &str = "gs_captcha_f";

/// Default bibliography file
pub const DEFAULT_INPUT: &str = "input.bib";

/// Default output table
pub const DEFAULT_OUTPUT: &str = "citations_papers.csv";

/// Browser session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Browser executable driven over the DevTools protocol
    pub driver_path: PathBuf,
    /// Persistent profile directory, keeps cookies between runs
    pub profile_dir: Option<PathBuf>,
    /// Run without a visible window (CAPTCHAs cannot be solved then)
    pub headless: bool,
}

impl SessionConfig {
    pub fn new(driver_path: impl Into<PathBuf>) -> Self {
        Self {
            driver_path: driver_path.into(),
            profile_dir: default_profile_dir(),
            headless: false,
        }
    }
}

/// Default profile location: `~/.scholarcite/profile`
pub fn default_profile_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".scholarcite").join("profile"))
}

/// Settings for a single title lookup
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Search engine landing page
    pub base_url: Url,
    /// `name` attribute of the search input
    pub search_input: String,
    /// Pause after submission before the page is inspected
    pub settle: Duration,
}

impl QueryConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            search_input: DEFAULT_SEARCH_INPUT.to_string(),
            settle: Duration::from_secs(3),
        })
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SCHOLAR_URL).unwrap_or_else(|_| unreachable!("default URL is valid"))
    }
}

/// Delay applied after every entry
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    /// Fixed part of the pause
    pub delay: Duration,
    /// Upper bound of the random extra pause
    pub jitter: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            jitter: Duration::ZERO,
        }
    }
}

/// Everything a run needs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub session: SessionConfig,
    pub query: QueryConfig,
    pub throttle: ThrottleConfig,
    /// DOM id whose presence means a challenge is showing
    pub challenge_marker: String,
    /// Entries to skip from the start of the bibliography
    pub skip: usize,
    /// Maximum number of entries to query
    pub limit: Option<usize>,
}

impl PipelineConfig {
    pub fn new(driver_path: impl Into<PathBuf>) -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            session: SessionConfig::new(driver_path),
            query: QueryConfig::default(),
            throttle: ThrottleConfig::default(),
            challenge_marker: DEFAULT_CHALLENGE_MARKER.to_string(),
            skip: 0,
            limit: None,
        }
    }

    /// Check values that would otherwise only fail deep inside a run.
    pub fn validate(&self) -> Result<()> {
        if self.session.driver_path.as_os_str().is_empty() {
            return Err(CiteError::Config("browser driver path is empty".to_string()));
        }
        if same_file(&self.input, &self.output) {
            return Err(CiteError::Config(format!(
                "output {:?} would overwrite the input file",
                self.output
            )));
        }
        if self.challenge_marker.trim().is_empty() {
            return Err(CiteError::Config("challenge marker id is empty".to_string()));
        }
        if self.query.search_input.trim().is_empty() {
            return Err(CiteError::Config("search input name is empty".to_string()));
        }
        Ok(())
    }

    /// Apply `skip`/`limit` to the extracted entries.
    pub fn select_entries(&self, entries: Vec<Entry>) -> Vec<Entry> {
        entries
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Whether two paths name the same file, resolving `.`/`..` and symlinks
/// for whatever part of each path already exists.
fn same_file(a: &Path, b: &Path) -> bool {
    a == b || resolve(a) == resolve(b)
}

fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| CiteError::Config(format!("Invalid base URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(CiteError::Config(format!(
            "Unsupported URL scheme '{}' in '{}'",
            other, raw
        ))),
    }
}
