/// Run state definitions for the sweep lifecycle
///
/// This module defines every state the run controller can be in.
use crate::crawler::RunOutcome;
use std::fmt;

/// Represents the current state of the sweep
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    // ===== Idle =====
    /// No run has started, or the last one was acknowledged
    #[default]
    Idle,

    // ===== Active States =====
    /// A sweep is in progress
    Running,

    /// Cancellation was requested; the sweep stops at its next checkpoint
    Cancelling,

    // ===== Terminal States =====
    /// The sweep finished its queue
    Completed { blocked: u64 },

    /// The sweep stopped on request
    Cancelled,

    /// The sweep stopped on a page failure
    Errored { message: String },
}

impl RunState {
    /// Terminal state for a finished run
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed(summary) => Self::Completed {
                blocked: summary.blocked,
            },
            RunOutcome::Cancelled(_) => Self::Cancelled,
            RunOutcome::Failed { cause, .. } => Self::Errored {
                message: cause.clone(),
            },
        }
    }

    /// Returns true while a sweep is in progress
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Cancelling)
    }

    /// Returns true once a sweep has ended
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Cancelled | Self::Errored { .. }
        )
    }

    /// Short status text for display
    pub fn label(&self) -> String {
        match self {
            Self::Idle => "Idle".to_string(),
            Self::Running => "Processing... (Ctrl-C to cancel)".to_string(),
            Self::Cancelling => "Cancelling...".to_string(),
            Self::Completed { blocked } => format!("Completed: {} users blocked", blocked),
            Self::Cancelled => "Cancelled".to_string(),
            Self::Errored { message } => format!("Error: {}", message),
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
