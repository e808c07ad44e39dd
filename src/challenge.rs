//! CAPTCHA gate.
//!
//! After a search is submitted the page is checked once for the challenge
//! form. If it is there the whole run pauses until the operator confirms on
//! the terminal that it was solved. There is no timeout and no re-check:
//! the operator's confirmation is taken at face value.

use crate::error::Result;
use crate::session::WebSession;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::{info, warn};

/// What the gate found on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// No challenge marker, returned without waiting
    Clear,
    /// Challenge shown, operator signalled to continue
    Resolved,
}

/// Pauses the run while a challenge is showing.
pub struct ChallengeGate<R, W> {
    marker_id: String,
    input: R,
    output: W,
}

impl ChallengeGate<BufReader<Stdin>, Stdout> {
    /// Gate that prompts on stdout and waits for Enter on stdin.
    pub fn stdio(marker_id: impl Into<String>) -> Self {
        Self::new(marker_id, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ChallengeGate<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(marker_id: impl Into<String>, input: R, output: W) -> Self {
        Self {
            marker_id: marker_id.into(),
            input,
            output,
        }
    }

    /// Check the current page and block until any challenge is handled.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be inspected or the prompt cannot
    /// be written.
    pub async fn await_resolution(
        &mut self,
        session: &mut dyn WebSession,
    ) -> Result<ChallengeOutcome> {
        if !session.element_exists(&self.marker_id).await? {
            return Ok(ChallengeOutcome::Clear);
        }

        warn!(marker = %self.marker_id, "CAPTCHA detected, waiting for operator");

        self.output
            .write_all(b"\nCAPTCHA detected. Please solve the CAPTCHA in the browser.\n")
            .await?;
        self.output
            .write_all(b"After solving, press Enter here to continue...\n")
            .await?;
        self.output.flush().await?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).await?;
        if read == 0 {
            warn!("Operator input closed, continuing without confirmation");
        } else {
            info!("Operator confirmed, resuming");
        }

        Ok(ChallengeOutcome::Resolved)
    }

    /// Release the input/output handles.
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}
