//! Tracing-backed observer
//!
//! Emits the structured log line for every block, carrying the user id,
//! display name, handle, permalink and reply text as fields.

use crate::output::traits::{BlockEvent, CrawlObserver, OutputResult};

/// Observer that reports crawl events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl CrawlObserver for LogObserver {
    fn page_fetched(&mut self, page: u64, entries: usize) -> OutputResult<()> {
        tracing::debug!("Parsed conversation page {} ({} entries)", page, entries);
        Ok(())
    }

    fn user_evaluated(&mut self, user_id: &str, matched: bool) -> OutputResult<()> {
        tracing::trace!(
            "Evaluated user {}: {}",
            user_id,
            if matched { "match" } else { "no match" }
        );
        Ok(())
    }

    fn user_blocked(&mut self, event: &BlockEvent) -> OutputResult<()> {
        let action = if event.dry_run { "Would block" } else { "Blocked" };
        tracing::info!(
            user_id = %event.user_id,
            name = %event.name,
            screen_name = %event.screen_name,
            permalink = %event.permalink,
            text = %event.tweet_text,
            "{} {} (@{}): {}",
            action,
            event.name,
            event.screen_name,
            event.permalink
        );
        Ok(())
    }

    fn block_failed(&mut self, event: &BlockEvent) -> OutputResult<()> {
        tracing::warn!(
            user_id = %event.user_id,
            screen_name = %event.screen_name,
            "Failed to block @{}",
            event.screen_name
        );
        Ok(())
    }
}
