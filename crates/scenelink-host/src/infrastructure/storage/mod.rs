//! Storage module: configuration persistence.

pub mod config;

pub use config::{ConfigError, HostConfig};
