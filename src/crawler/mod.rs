//! Crawler module for sweeping a conversation
//!
//! This module contains the core sweep logic, including:
//! - Authenticated, cancellable HTTP requests with retry logic
//! - Conversation page and following-list extraction
//! - Cursor queueing and the block action
//! - Overall sweep coordination

mod blocker;
mod coordinator;
mod endpoints;
mod following;
mod queue;
mod timeline;
mod transport;

pub use blocker::block_user;
pub use coordinator::Coordinator;
pub use endpoints::Endpoints;
pub use following::{fetch_following, parse_following, FollowingEdge};
pub use queue::CursorQueue;
pub use timeline::{parse_conversation_page, ConversationPage, Entry, TweetEntry, Withheld};
pub use transport::{build_http_client, Cancelled, Transport};

use crate::config::Config;
use crate::predicate::Predicate;
use crate::SweeperError;
use tokio_util::sync::CancellationToken;

/// Counts reached by a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Confirmed blocks (matches, on a dry run)
    pub blocked: u64,

    /// Matched users whose block request failed
    pub block_failures: u64,

    /// Distinct repliers the predicate was evaluated for
    pub users_evaluated: u64,

    /// Conversation pages fetched
    pub pages_fetched: u64,

    pub dry_run: bool,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The cursor queue was exhausted
    Completed(RunSummary),

    /// The run was cancelled; blocks already confirmed stand
    Cancelled(RunSummary),

    /// A conversation page could not be fetched or parsed
    Failed { cause: String, summary: RunSummary },
}

impl RunOutcome {
    /// Counts reached before the run ended
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Completed(summary) | RunOutcome::Cancelled(summary) => summary,
            RunOutcome::Failed { summary, .. } => summary,
        }
    }

    pub fn blocked(&self) -> u64 {
        self.summary().blocked
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

/// Runs a complete sweep of one conversation
///
/// This is the main entry point for a sweep without observers.
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `root_id` - Id of the conversation's root tweet
/// * `predicate` - Compiled predicate
/// * `cancel` - Token that stops the run at its next checkpoint
///
/// # Returns
///
/// * `Ok(RunOutcome)` - The run ended, in any of its outcomes
/// * `Err(SweeperError)` - The sweep could not be set up
pub async fn sweep(
    config: &Config,
    root_id: &str,
    predicate: &Predicate,
    cancel: &CancellationToken,
) -> Result<RunOutcome, SweeperError> {
    let mut coordinator = Coordinator::new(config)?;
    Ok(coordinator.run(root_id, predicate, cancel).await)
}
