//! Crawler coordinator - main sweep orchestration logic
//!
//! This module contains the sweep loop that walks one conversation:
//! - Taking page cursors from the queue in discovery order
//! - Fetching and parsing each conversation page
//! - Evaluating the predicate once per distinct replier
//! - Issuing block calls and recording block events
//! - Stopping at the next checkpoint once the run is cancelled

use crate::config::Config;
use crate::crawler::blocker::block_user;
use crate::crawler::endpoints::Endpoints;
use crate::crawler::following::fetch_following;
use crate::crawler::queue::CursorQueue;
use crate::crawler::timeline::{parse_conversation_page, ConversationPage, Entry, TweetEntry};
use crate::crawler::transport::{Cancelled, Transport};
use crate::crawler::{RunOutcome, RunSummary};
use crate::output::{BlockEvent, CrawlObserver, LogObserver, OutputResult};
use crate::predicate::{Predicate, PredicateInput};
use crate::SweeperError;
use reqwest::Method;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Why a sweep stopped before the queue ran dry
#[derive(Debug)]
enum Interrupt {
    Cancelled,
    Failed(SweeperError),
}

impl From<Cancelled> for Interrupt {
    fn from(_: Cancelled) -> Self {
        Interrupt::Cancelled
    }
}

impl From<SweeperError> for Interrupt {
    fn from(e: SweeperError) -> Self {
        Interrupt::Failed(e)
    }
}

/// Main sweep coordinator structure
pub struct Coordinator {
    transport: Transport,
    endpoints: Endpoints,
    following_page_size: u32,
    dry_run: bool,
    observers: Vec<Box<dyn CrawlObserver + Send>>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SweeperError)` - The endpoints or session headers are unusable
    pub fn new(config: &Config) -> Result<Self, SweeperError> {
        Ok(Self {
            transport: Transport::new(&config.session, &config.crawler)?,
            endpoints: Endpoints::from_config(&config.endpoints)?,
            following_page_size: config.crawler.following_page_size,
            dry_run: false,
            observers: vec![Box::new(LogObserver) as Box<dyn CrawlObserver + Send>],
        })
    }

    /// Evaluates matches without sending block requests
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Registers an observer in addition to the log observer
    pub fn with_observer(mut self, observer: Box<dyn CrawlObserver + Send>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Sweeps the conversation rooted at `root_id`
    ///
    /// Pages are visited breadth-first starting from the first page. Each
    /// distinct replier is evaluated at most once per run, on their first
    /// reply in page order. The token is checked before every page request
    /// and before every step for a replier.
    ///
    /// # Returns
    ///
    /// The outcome together with the counts reached, also when the run was
    /// cancelled or failed part-way.
    pub async fn run(
        &mut self,
        root_id: &str,
        predicate: &Predicate,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        tracing::info!(
            "Starting sweep of conversation {} with predicate {}{}",
            root_id,
            predicate.fingerprint(),
            if self.dry_run { " (dry run)" } else { "" }
        );
        tracing::debug!("Predicate source:\n{}", predicate.source());

        let start_time = std::time::Instant::now();
        let mut summary = RunSummary {
            dry_run: self.dry_run,
            ..RunSummary::default()
        };

        let outcome = match self.sweep(root_id, predicate, cancel, &mut summary).await {
            Ok(()) => RunOutcome::Completed(summary),
            Err(Interrupt::Cancelled) => {
                tracing::info!("Sweep cancelled");
                RunOutcome::Cancelled(summary)
            }
            Err(Interrupt::Failed(e)) => {
                tracing::error!("Sweep failed: {}", e);
                RunOutcome::Failed {
                    cause: e.to_string(),
                    summary,
                }
            }
        };

        tracing::info!(
            "Sweep finished: {} blocked, {} evaluated, {} pages in {:?}",
            outcome.summary().blocked,
            outcome.summary().users_evaluated,
            outcome.summary().pages_fetched,
            start_time.elapsed()
        );
        self.notify(|o| o.run_finished(&outcome));

        outcome
    }

    async fn sweep(
        &mut self,
        root_id: &str,
        predicate: &Predicate,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), Interrupt> {
        let mut queue = CursorQueue::new();
        let mut processed: HashSet<String> = HashSet::new();

        while let Some(cursor) = queue.pop() {
            if cancel.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }

            let page = self.fetch_page(root_id, cursor, cancel).await?;
            summary.pages_fetched += 1;

            let pages = summary.pages_fetched;
            let entries = page.entries.len();
            self.notify(|o| o.page_fetched(pages, entries));

            for entry in page.entries {
                match entry {
                    Entry::Cursor(token) => queue.push(token),
                    Entry::Tweet(tweet) => {
                        if processed.contains(&tweet.author_id) {
                            continue;
                        }
                        self.process_replier(&tweet, predicate, cancel, summary)
                            .await?;
                        processed.insert(tweet.author_id);
                    }
                    Entry::Withheld(reason) => {
                        tracing::debug!("Skipping withheld tweet ({:?})", reason);
                    }
                    Entry::Other => {}
                }
            }

            tracing::info!(
                "Progress: {} pages fetched, {} queued ({} cursors found), {} users evaluated, {} blocked",
                summary.pages_fetched,
                queue.len(),
                queue.discovered(),
                summary.users_evaluated,
                summary.blocked
            );
        }

        if cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        Ok(())
    }

    /// Fetches and parses one conversation page
    async fn fetch_page(
        &self,
        root_id: &str,
        cursor: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<ConversationPage, Interrupt> {
        tracing::debug!("Fetching conversation page (cursor: {:?})", cursor);

        let url = self.endpoints.conversation(root_id, cursor.as_deref());
        let json = self
            .transport
            .request(Method::GET, url, None, cancel)
            .await?
            .ok_or_else(|| SweeperError::PageFetch {
                cursor: cursor.clone(),
            })?;

        let page = parse_conversation_page(json)
            .map_err(|message| SweeperError::MalformedPage { cursor, message })?;
        Ok(page)
    }

    /// Evaluates one replier and blocks them if the predicate matches
    async fn process_replier(
        &mut self,
        tweet: &TweetEntry,
        predicate: &Predicate,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), Interrupt> {
        if cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }

        let following_users = fetch_following(
            &self.transport,
            &self.endpoints,
            &tweet.author_id,
            self.following_page_size,
            cancel,
        )
        .await?;

        if cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }

        let input = PredicateInput {
            profile: tweet.profile.clone(),
            tweet: tweet.tweet.clone(),
            following_users,
        };
        let matched = predicate.should_block(&input);
        summary.users_evaluated += 1;
        self.notify(|o| o.user_evaluated(&tweet.author_id, matched));

        if !matched {
            return Ok(());
        }

        let permalink = self
            .endpoints
            .permalink(tweet.screen_name(), &tweet.tweet_id);
        let event = BlockEvent::new(tweet, permalink, self.dry_run);

        if self.dry_run {
            summary.blocked += 1;
            self.notify(|o| o.user_blocked(&event));
            return Ok(());
        }

        if cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }

        if block_user(&self.transport, &self.endpoints, &tweet.author_id, cancel).await? {
            summary.blocked += 1;
            self.notify(|o| o.user_blocked(&event));
        } else {
            summary.block_failures += 1;
            self.notify(|o| o.block_failed(&event));
        }

        Ok(())
    }

    /// Passes an event to every observer, logging observer failures
    fn notify<F>(&mut self, mut event: F)
    where
        F: FnMut(&mut dyn CrawlObserver) -> OutputResult<()>,
    {
        for observer in self.observers.iter_mut() {
            if let Err(e) = event(observer.as_mut()) {
                tracing::warn!("Observer failed to record event: {}", e);
            }
        }
    }
}
