//! # Service Container
//!
//! The worker's configuration and the registry its init steps fill.

pub mod config;
pub mod services;

pub use config::{ConfigError, WorkerConfig};
pub use services::{ContainerError, ServiceContainer};
