//! Configuration module for Reply-Sweeper
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use reply_sweeper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweeper.toml")).unwrap();
//! println!("Following page size: {}", config.crawler.following_page_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, EndpointConfig, OutputConfig, PredicateConfig, SessionConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
