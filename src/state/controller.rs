//! Run controller
//!
//! Owns the lifecycle of one sweep at a time. State changes are published
//! on a watch channel; the cancellation token of the active run lives here
//! so any task holding the controller can stop it.

use crate::crawler::RunOutcome;
use crate::state::RunState;
use crate::SweeperError;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Serializes sweeps and exposes their state
#[derive(Debug)]
pub struct RunController {
    state: watch::Sender<RunState>,
    token: Mutex<Option<CancellationToken>>,
}

impl RunController {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            state,
            token: Mutex::new(None),
        }
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Current state
    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    /// Starts a run
    ///
    /// # Returns
    ///
    /// * `Ok(token)` - Token for the new run
    /// * `Err(SweeperError::RunInProgress)` - Another run is still active
    pub fn begin(&self) -> Result<CancellationToken, SweeperError> {
        let mut slot = self.token_slot();

        let started = self.state.send_if_modified(|state| {
            if state.is_active() {
                return false;
            }
            *state = RunState::Running;
            true
        });
        if !started {
            tracing::warn!("Refusing to start a run while another is active");
            return Err(SweeperError::RunInProgress);
        }

        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Requests cancellation of the active run
    ///
    /// Returns false when no run is running.
    pub fn cancel(&self) -> bool {
        let slot = self.token_slot();

        let cancelling = self.state.send_if_modified(|state| {
            if *state != RunState::Running {
                return false;
            }
            *state = RunState::Cancelling;
            true
        });

        if cancelling {
            if let Some(token) = slot.as_ref() {
                token.cancel();
            }
            tracing::info!("Cancelling run");
        }
        cancelling
    }

    /// Records the end of the active run
    pub fn finish(&self, outcome: &RunOutcome) {
        let mut slot = self.token_slot();
        *slot = None;
        self.state.send_replace(RunState::from_outcome(outcome));
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}
