//! State module for tracking the sweep lifecycle
//!
//! # Components
//!
//! - `RunState`: Idle, active and terminal states of a sweep
//! - `RunController`: Starts, cancels and finishes sweeps, one at a time

mod controller;
mod run_state;

pub use controller::RunController;
pub use run_state::RunState;
