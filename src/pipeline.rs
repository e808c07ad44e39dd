//! Sequential lookup loop.
//!
//! One entry at a time: query, record, persist, throttle. Only fatal setup
//! errors stop a run, and those happen before this loop starts.

use crate::bibliography::Entry;
use crate::challenge::ChallengeGate;
use crate::config::ThrottleConfig;
use crate::query::QueryEngine;
use crate::session::WebSession;
use crate::sink::{QueryResult, ResultSink};
use rand::Rng;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{error, info};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Entries whose rewrite of the output file failed
    pub persist_failures: usize,
}

/// Pause between lookups.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    config: ThrottleConfig,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self { config }
    }

    /// Fixed delay plus a random share of the jitter, saturating at
    /// `Duration::MAX`.
    pub fn next_delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.config.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.config.delay.saturating_add(Duration::from_millis(extra))
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Look up every entry in order and persist after each one.
pub async fn run<R, W>(
    entries: &[Entry],
    session: &mut dyn WebSession,
    gate: &mut ChallengeGate<R, W>,
    engine: &QueryEngine,
    sink: &mut ResultSink,
    throttle: &Throttle,
) -> RunSummary
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut summary = RunSummary::default();
    info!(entries = entries.len(), "Fetching citation counts from Google Scholar");

    for (index, entry) in entries.iter().enumerate() {
        info!(
            progress = %format!("{}/{}", index + 1, entries.len()),
            title = %entry.title,
            "Searching for title"
        );

        let citations = engine
            .query_citation_count(session, gate, &entry.title)
            .await;

        info!(
            id = %entry.id,
            title = %entry.title,
            citations = %citations,
            "Article processed"
        );

        summary.processed += 1;
        if citations.is_resolved() {
            summary.resolved += 1;
        } else {
            summary.unresolved += 1;
        }

        let result = QueryResult {
            entry: entry.clone(),
            citations,
        };
        if let Err(e) = sink.record_and_persist(result) {
            summary.persist_failures += 1;
            error!(id = %entry.id, error = %e, "Failed to save progress");
        }

        throttle.pause().await;
    }

    info!(
        processed = summary.processed,
        resolved = summary.resolved,
        unresolved = summary.unresolved,
        output = %sink.path().display(),
        "Run complete"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::extract::CitedByExtractor;
    use crate::query::CitationCount;
    use crate::session::testing::{Scripted, ScriptedSession};
    use tempfile::TempDir;

    fn entry(id: &str, title: &str) -> Entry {
        Entry {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    fn results_page(counts: &[u64]) -> String {
        counts
            .iter()
            .map(|n| format!(r#"<a href="/scholar?cites=1">Cited by {}</a>"#, n))
            .collect()
    }

    fn engine() -> QueryEngine {
        let mut config = QueryConfig::default();
        config.settle = Duration::ZERO;
        QueryEngine::new(config, Box::new(CitedByExtractor::default()))
    }

    fn no_throttle() -> Throttle {
        Throttle::new(ThrottleConfig {
            delay: Duration::ZERO,
            jitter: Duration::ZERO,
        })
    }

    #[test]
    fn test_throttle_within_bounds() {
        let throttle = Throttle::new(ThrottleConfig {
            delay: Duration::from_millis(100),
            jitter: Duration::from_millis(50),
        });
        for _ in 0..100 {
            let d = throttle.next_delay();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
        }
        assert_eq!(no_throttle().next_delay(), Duration::ZERO);
    }

    #[test]
    fn test_throttle_huge_values_saturate() {
        let throttle = Throttle::new(ThrottleConfig {
            delay: Duration::from_secs(5),
            jitter: Duration::from_millis(u64::MAX),
        });
        assert!(throttle.next_delay() >= Duration::from_secs(5));

        let throttle = Throttle::new(ThrottleConfig {
            delay: Duration::MAX,
            jitter: Duration::from_millis(u64::MAX),
        });
        assert_eq!(throttle.next_delay(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_applies_after_unresolved_entries() {
        let dir = TempDir::new().expect("tempdir");
        let entries = vec![entry("a", "Nothing Here"), entry("b", "Found")];
        let mut session = ScriptedSession::new(vec![
            Scripted::Page(results_page(&[])),
            Scripted::Page(results_page(&[9])),
        ]);
        let mut gate = ChallengeGate::new("gs_captcha_f", &b""[..], Vec::new());
        let mut sink = ResultSink::new(dir.path().join("out.csv"));
        let delay = Duration::from_secs(5);
        let throttle = Throttle::new(ThrottleConfig {
            delay,
            jitter: Duration::ZERO,
        });

        let started = tokio::time::Instant::now();
        let summary = run(&entries, &mut session, &mut gate, &engine(), &mut sink, &throttle).await;

        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.resolved, 1);
        assert!(started.elapsed() >= delay * 2);
    }

    #[tokio::test]
    async fn test_bibliography_file_to_csv() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("input.bib");
        let output = dir.path().join("citations_papers.csv");
        std::fs::write(
            &input,
            "@article{paper1,\n  title = {Deep Learning}\n}\n\n\
             @misc{,\n  title = {Graph Theory}\n}\n",
        )
        .expect("write bib");

        let entries = crate::bibliography::extract_entries(&input).expect("entries");
        let mut session = ScriptedSession::new(vec![
            Scripted::Page(results_page(&[5, 7])),
            Scripted::Page(results_page(&[])),
        ]);
        let calls = session.calls.clone();
        let mut gate = ChallengeGate::new("gs_captcha_f", &b""[..], Vec::new());
        let mut sink = ResultSink::new(&output);

        run(&entries, &mut session, &mut gate, &engine(), &mut sink, &no_throttle()).await;

        assert_eq!(
            calls.lock().expect("calls lock").searched,
            vec!["Deep Learning".to_string(), "Graph Theory".to_string()]
        );
        assert_eq!(
            std::fs::read_to_string(&output).expect("read output"),
            "Article ID,Title,Citations\n\
             paper1,Deep Learning,12\n\
             article_1,Graph Theory,Not found\n"
        );
    }

    #[tokio::test]
    async fn test_run_records_every_entry_in_order() {
        let dir = TempDir::new().expect("tempdir");
        let output = dir.path().join("citations_papers.csv");

        let entries = vec![
            entry("paper1", "Deep Learning"),
            entry("article_1", "Graph Theory"),
            entry("paper3", "Unreachable"),
        ];
        let mut session = ScriptedSession::new(vec![
            Scripted::Page(results_page(&[5, 7])),
            Scripted::Page(results_page(&[])),
            Scripted::NavigationError,
        ]);
        let calls = session.calls.clone();
        let mut gate = ChallengeGate::new("gs_captcha_f", &b""[..], Vec::new());
        let mut sink = ResultSink::new(&output);

        let summary = run(&entries, &mut session, &mut gate, &engine(), &mut sink, &no_throttle()).await;

        assert_eq!(
            summary,
            RunSummary {
                processed: 3,
                resolved: 1,
                unresolved: 2,
                persist_failures: 0,
            }
        );
        assert_eq!(calls.lock().expect("calls lock").navigated.len(), 3);

        let citations: Vec<CitationCount> = sink.results().iter().map(|r| r.citations).collect();
        assert_eq!(
            citations,
            vec![
                CitationCount::Count(12),
                CitationCount::Unresolved,
                CitationCount::Unresolved
            ]
        );

        let written = std::fs::read_to_string(&output).expect("read output");
        assert_eq!(
            written,
            "Article ID,Title,Citations\n\
             paper1,Deep Learning,12\n\
             article_1,Graph Theory,Not found\n\
             paper3,Unreachable,Not found\n"
        );
    }

    #[tokio::test]
    async fn test_run_continues_when_output_unwritable() {
        let entries = vec![entry("a", "First"), entry("b", "Second")];
        let mut session = ScriptedSession::new(vec![
            Scripted::Page(results_page(&[1])),
            Scripted::Page(results_page(&[2])),
        ]);
        let mut gate = ChallengeGate::new("gs_captcha_f", &b""[..], Vec::new());
        let mut sink = ResultSink::new("/nonexistent/dir/out.csv");

        let summary = run(&entries, &mut session, &mut gate, &engine(), &mut sink, &no_throttle()).await;

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.resolved, 2);
        assert_eq!(summary.persist_failures, 2);
        assert_eq!(sink.results().len(), 2);
    }
}
