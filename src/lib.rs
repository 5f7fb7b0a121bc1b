//! Reply-Sweeper: a conversation-scoped moderation crawler
//!
//! This crate walks the reply tree of a single conversation thread, inspects
//! each replier's profile and following list, evaluates a user-authored
//! predicate, and blocks the accounts it matches.

pub mod config;
pub mod crawler;
pub mod output;
pub mod predicate;
pub mod state;
pub mod thread;

use thiserror::Error;

/// Main error type for Reply-Sweeper operations
#[derive(Debug, Error)]
pub enum SweeperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Predicate error: {0}")]
    Predicate(#[from] predicate::PredicateError),

    #[error("Invalid thread reference: {0}")]
    ThreadId(String),

    #[error("Conversation page request failed (cursor: {cursor:?})")]
    PageFetch { cursor: Option<String> },

    #[error("Malformed conversation page (cursor: {cursor:?}): {message}")]
    MalformedPage {
        cursor: Option<String>,
        message: String,
    },

    #[error("A run is already in progress")]
    RunInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Reply-Sweeper operations
pub type Result<T> = std::result::Result<T, SweeperError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{RunOutcome, RunSummary};
pub use state::{RunController, RunState};
pub use thread::parse_thread_id;
