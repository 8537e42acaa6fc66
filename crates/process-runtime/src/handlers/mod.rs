//! # Handlers
//!
//! Process-engine entry points the message pump dispatches to.

pub mod process_activator;

pub use process_activator::{ProcessActivator, ResolvingDispatcher, PROCESS_ENGINE};
