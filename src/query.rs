//! Citation lookup for one title.
//!
//! Each lookup walks the same fixed sequence against the shared browser
//! session: open the landing page, submit the title, clear any challenge,
//! let the results render, then reduce the page to a count. Every failure is
//! caught here and turned into [`CitationCount::Unresolved`], so one bad
//! title never stops the run.

use crate::challenge::ChallengeGate;
use crate::config::QueryConfig;
use crate::error::{CiteError, Result};
use crate::extract::CitationExtractor;
use crate::session::WebSession;
use serde::{Serialize, Serializer};
use std::fmt;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Cell text written for unresolved lookups
pub const UNRESOLVED: &str = "Not found";

/// Outcome of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationCount {
    Count(u64),
    Unresolved,
}

impl CitationCount {
    pub fn is_resolved(&self) -> bool {
        matches!(self, CitationCount::Count(_))
    }
}

impl fmt::Display for CitationCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationCount::Count(n) => write!(f, "{}", n),
            CitationCount::Unresolved => f.write_str(UNRESOLVED),
        }
    }
}

impl Serialize for CitationCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CitationCount::Count(n) => serializer.serialize_u64(*n),
            CitationCount::Unresolved => serializer.serialize_str(UNRESOLVED),
        }
    }
}

/// Progress of a single lookup, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Navigated,
    Submitted,
    AwaitingChallenge,
    AwaitingResults,
    Extracted,
}

/// Drives lookups through a session.
pub struct QueryEngine {
    config: QueryConfig,
    extractor: Box<dyn CitationExtractor>,
}

impl QueryEngine {
    pub fn new(config: QueryConfig, extractor: Box<dyn CitationExtractor>) -> Self {
        Self { config, extractor }
    }

    /// Look up the total citation count for `title`.
    ///
    /// Never fails: errors are logged with the title and reported as
    /// `Unresolved`. The lookup is not retried.
    pub async fn query_citation_count<R, W>(
        &self,
        session: &mut dyn WebSession,
        gate: &mut ChallengeGate<R, W>,
        title: &str,
    ) -> CitationCount
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        match self.run(session, gate, title).await {
            Ok(Some(count)) => CitationCount::Count(count),
            Ok(None) => {
                warn!(title, "Citations not found for title");
                CitationCount::Unresolved
            }
            Err(CiteError::Parse(reason)) => {
                warn!(title, reason = %reason, "Citations not found for title");
                CitationCount::Unresolved
            }
            Err(e) => {
                warn!(title, error = %e, "Error searching for title");
                CitationCount::Unresolved
            }
        }
    }

    async fn run<R, W>(
        &self,
        session: &mut dyn WebSession,
        gate: &mut ChallengeGate<R, W>,
        title: &str,
    ) -> Result<Option<u64>>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut state = QueryState::Idle;
        debug!(title, ?state, "Starting lookup");

        session.navigate(self.config.base_url.as_str()).await?;
        state = QueryState::Navigated;
        debug!(?state, url = %self.config.base_url);

        session
            .submit_search(&self.config.search_input, title)
            .await?;
        state = QueryState::Submitted;
        debug!(?state);

        state = QueryState::AwaitingChallenge;
        let outcome = gate.await_resolution(session).await?;
        debug!(?state, ?outcome);

        state = QueryState::AwaitingResults;
        debug!(?state, settle_ms = self.config.settle.as_millis() as u64);
        if !self.config.settle.is_zero() {
            tokio::time::sleep(self.config.settle).await;
        }

        let html = session.page_html().await?;
        let count = self.extractor.extract(&html)?;
        state = QueryState::Extracted;
        info!(title, ?state, count = ?count, "Lookup finished");
        Ok(count)
    }
}
