//! # scholarcite
//!
//! Google Scholar citation counts for every entry of a BibTeX file.
//!
//! ## Modules
//!
//! - [`bibliography`] - BibTeX entry extraction
//! - [`session`] - Browser session (Chromium via chromiumoxide)
//! - [`challenge`] - CAPTCHA gate with operator confirmation
//! - [`extract`] - "Cited by" link matching
//! - [`query`] - Per-title citation lookup
//! - [`sink`] - Incremental CSV output
//! - [`pipeline`] - Sequential lookup loop
//! - [`config`] - Run configuration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholarcite::challenge::ChallengeGate;
//! use scholarcite::config::PipelineConfig;
//! use scholarcite::extract::CitedByExtractor;
//! use scholarcite::pipeline::{self, Throttle};
//! use scholarcite::query::QueryEngine;
//! use scholarcite::session::{close_session, ChromiumSession};
//! use scholarcite::sink::ResultSink;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::new("/usr/bin/chromium");
//!     let entries = scholarcite::bibliography::extract_entries(&config.input)?;
//!
//!     let mut session = ChromiumSession::open(&config.session).await?;
//!     let mut gate = ChallengeGate::stdio(config.challenge_marker.clone());
//!     let engine = QueryEngine::new(config.query.clone(), Box::new(CitedByExtractor::default()));
//!     let mut sink = ResultSink::new(&config.output);
//!     let throttle = Throttle::new(config.throttle);
//!
//!     let summary =
//!         pipeline::run(&entries, &mut session, &mut gate, &engine, &mut sink, &throttle).await;
//!     close_session(Box::new(session)).await;
//!     println!("Processed {} entries", summary.processed);
//!     Ok(())
//! }
//! ```

pub mod bibliography;
pub mod challenge;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod query;
pub mod session;
pub mod sink;

pub use error::{CiteError, Result};
