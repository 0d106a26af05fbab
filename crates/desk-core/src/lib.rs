//! Core abstractions for equity-desk
//!
//! This crate defines the traits and value types shared by every other crate
//! in the workspace: the [`Agent`] trait implemented by pipeline stages, the
//! [`Context`] they read from, ticker [`Symbol`]s and per-invocation
//! [`StageIdentity`] tokens.

pub mod agent;
pub mod context;
pub mod error;
pub mod stage;
pub mod symbol;

pub use agent::Agent;
pub use context::Context;
pub use error::{Error, Result};
pub use stage::StageIdentity;
pub use symbol::{Symbol, SymbolSet};
