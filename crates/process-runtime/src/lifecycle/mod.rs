//! # Worker Lifecycle
//!
//! Public start/stop contract and the worker's state.

pub mod state;
pub mod worker;

pub use state::{WorkerState, WorkerStateCell};
pub use worker::Worker;
