//! Crawl observer trait and block event types
//!
//! Observers receive the side effects of a run as they happen. Every hook
//! has a no-op default, so an observer implements only what it records.

use crate::crawler::{RunOutcome, TweetEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A replier the predicate matched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockEvent {
    /// Numeric id of the account
    pub user_id: String,

    /// Display name
    pub name: String,

    /// Handle without the `@`
    pub screen_name: String,

    /// Id of the matched reply
    pub tweet_id: String,

    /// Link to the matched reply
    pub permalink: String,

    /// Text of the matched reply
    pub tweet_text: String,

    /// The block call was skipped
    pub dry_run: bool,

    pub at: DateTime<Utc>,
}

impl BlockEvent {
    /// Creates an event for the author of `tweet`
    pub fn new(tweet: &TweetEntry, permalink: String, dry_run: bool) -> Self {
        Self {
            user_id: tweet.author_id.clone(),
            name: tweet.display_name().to_string(),
            screen_name: tweet.screen_name().to_string(),
            tweet_id: tweet.tweet_id.clone(),
            permalink,
            tweet_text: tweet.text().to_string(),
            dry_run,
            at: Utc::now(),
        }
    }
}

/// Receives crawl events as a run progresses
pub trait CrawlObserver {
    /// A conversation page was fetched and parsed
    ///
    /// # Arguments
    ///
    /// * `page` - 1-based page number
    /// * `entries` - Number of entries on the page
    fn page_fetched(&mut self, page: u64, entries: usize) -> OutputResult<()> {
        let _ = (page, entries);
        Ok(())
    }

    /// The predicate was evaluated for a replier
    fn user_evaluated(&mut self, user_id: &str, matched: bool) -> OutputResult<()> {
        let _ = (user_id, matched);
        Ok(())
    }

    /// A replier was blocked (or would have been, on a dry run)
    fn user_blocked(&mut self, event: &BlockEvent) -> OutputResult<()> {
        let _ = event;
        Ok(())
    }

    /// The block call for a matched replier failed
    fn block_failed(&mut self, event: &BlockEvent) -> OutputResult<()> {
        let _ = event;
        Ok(())
    }

    /// The run ended
    fn run_finished(&mut self, outcome: &RunOutcome) -> OutputResult<()> {
        let _ = outcome;
        Ok(())
    }
}
