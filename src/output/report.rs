//! JSON-lines run report
//!
//! Appends one JSON object per line for every block, failed block and the
//! final outcome of a run. Each record carries a `kind` field.

use crate::crawler::RunOutcome;
use crate::output::traits::{BlockEvent, CrawlObserver, OutputResult};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    Blocked(&'a BlockEvent),
    BlockFailed(&'a BlockEvent),
    Finished {
        status: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        cause: Option<&'a str>,
        blocked: u64,
        block_failures: u64,
        users_evaluated: u64,
        pages_fetched: u64,
        dry_run: bool,
        at: chrono::DateTime<Utc>,
    },
}

/// Observer writing a JSON-lines report
pub struct JsonLinesReport<W: Write = BufWriter<File>> {
    writer: W,
}

impl JsonLinesReport {
    /// Opens `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> OutputResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesReport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, record: &Record<'_>) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> CrawlObserver for JsonLinesReport<W> {
    fn user_blocked(&mut self, event: &BlockEvent) -> OutputResult<()> {
        self.write(&Record::Blocked(event))
    }

    fn block_failed(&mut self, event: &BlockEvent) -> OutputResult<()> {
        self.write(&Record::BlockFailed(event))
    }

    fn run_finished(&mut self, outcome: &RunOutcome) -> OutputResult<()> {
        let summary = outcome.summary();
        let (status, cause) = match outcome {
            RunOutcome::Completed(_) => ("completed", None),
            RunOutcome::Cancelled(_) => ("cancelled", None),
            RunOutcome::Failed { cause, .. } => ("failed", Some(cause.as_str())),
        };

        self.write(&Record::Finished {
            status,
            cause,
            blocked: summary.blocked,
            block_failures: summary.block_failures,
            users_evaluated: summary.users_evaluated,
            pages_fetched: summary.pages_fetched,
            dry_run: summary.dry_run,
            at: Utc::now(),
        })?;
        self.writer.flush()?;
        Ok(())
    }
}
