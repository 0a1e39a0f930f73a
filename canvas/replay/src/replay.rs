//! NDJSON replay loop
//!
//! One intent per line in, one outcome per line out. Lines that do not
//! parse are answered with a rejected outcome; only I/O failures stop the
//! loop.

use anyhow::{Context, Result};
use canvas_core::{Intent, Outcome, Session};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Counts collected while replaying
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Non-blank lines read
    pub lines: usize,
    /// Intents that were applied
    pub applied: usize,
    /// Lines that were rejected, unparsable ones included
    pub rejected: usize,
}

impl ReplaySummary {
    fn record(&mut self, outcome: &Outcome) {
        self.lines += 1;
        if outcome.is_applied() {
            self.applied += 1;
        } else {
            self.rejected += 1;
        }
    }
}

/// Turn one input line into an outcome
///
/// Returns `None` for blank lines.
pub fn process_line(session: &Session, line: &str) -> Option<Outcome> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let outcome = match serde_json::from_str::<Intent>(line) {
        Ok(intent) => session.dispatch(intent),
        Err(e) => {
            debug!(error = %e, "Unparsable intent line");
            Outcome::unparsed(e.to_string())
        }
    };
    Some(outcome)
}

/// Replay every line of `reader` into `session`, writing outcomes to `writer`
pub async fn replay<R, W>(session: &Session, reader: R, writer: &mut W) -> Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = ReplaySummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read intent line")? {
        let Some(outcome) = process_line(session, &line) else {
            continue;
        };
        summary.record(&outcome);

        let mut encoded = serde_json::to_vec(&outcome).context("Failed to encode outcome")?;
        encoded.push(b'\n');
        writer
            .write_all(&encoded)
            .await
            .context("Failed to write outcome")?;
    }

    writer.flush().await.context("Failed to flush outcomes")?;
    Ok(summary)
}
