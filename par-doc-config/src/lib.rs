//! Configuration system for par-doc.
//!
//! This crate provides configuration loading, saving, and default values for
//! the multi-window document editor's tab handoff layer:
//!
//! - [`Config`] and its YAML persistence
//! - [`LogLevel`] for the debug log bridge
//! - [`ConfigError`] for callers that want to match on failure modes

pub mod config;
pub mod defaults;
pub mod error;
mod types;

pub use config::Config;
pub use error::ConfigError;
pub use types::LogLevel;
