//! Shared utilities for equity-desk
//!
//! Logging setup and the small environment-reading helpers every
//! configuration type in the workspace builds on.

pub mod config;
pub mod logging;

pub use config::{ConfigError, env_parse, env_var};
pub use logging::{LogConfig, LogFormat, init_tracing, init_tracing_with};
