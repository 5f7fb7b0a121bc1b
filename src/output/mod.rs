//! Output module for recording the side effects of a run
//!
//! This module handles:
//! - Observers that record block events as they happen
//! - The structured log line emitted for every block
//! - JSON-lines reports and plain-text run summaries

mod log;
mod report;
mod summary;
mod traits;

pub use log::LogObserver;
pub use report::JsonLinesReport;
pub use summary::{format_run_summary, print_run_summary};
pub use traits::{BlockEvent, CrawlObserver, OutputError, OutputResult};
