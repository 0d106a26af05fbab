//! Execution context for pipeline stages
//!
//! The `Context` struct is a key-value store the pipeline fills in before a
//! stage runs: which run it belongs to, which stage invocation this is and the
//! symbols under analysis. Stages may also stash their own values.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{StageIdentity, SymbolSet};

/// Well-known context keys
pub mod keys {
    /// Identifier of the whole pipeline run
    pub const RUN_ID: &str = "run_id";
    /// Display name of the stage currently executing
    pub const STAGE_NAME: &str = "stage_name";
    /// Identity minted for the current stage invocation
    pub const STAGE_ID: &str = "stage_id";
    /// Symbols under analysis
    pub const SYMBOLS: &str = "symbols";
}

/// Context passed to agents during execution
///
/// # Example
///
/// ```
/// use desk_core::Context;
///
/// let ctx = Context::new()
///     .with_run_id("run-1")
///     .with_stage_name("Stock Analyst");
///
/// assert_eq!(ctx.run_id(), Some("run-1"));
/// assert_eq!(ctx.stage_name(), Some("Stock Analyst"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    data: HashMap<String, serde_json::Value>,
}

impl Context {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    // =========== Builder Methods ===========

    /// Set the run identifier
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.insert(keys::RUN_ID, serde_json::json!(run_id.into()));
        self
    }

    /// Set the current stage name
    pub fn with_stage_name(mut self, name: impl Into<String>) -> Self {
        self.insert(keys::STAGE_NAME, serde_json::json!(name.into()));
        self
    }

    /// Set the symbols under analysis
    pub fn with_symbols(mut self, symbols: &SymbolSet) -> Self {
        self.set_symbols(symbols);
        self
    }

    // =========== Common Accessors ===========

    /// Get the run identifier
    pub fn run_id(&self) -> Option<&str> {
        self.get(keys::RUN_ID).and_then(|v| v.as_str())
    }

    /// Get the current stage name
    pub fn stage_name(&self) -> Option<&str> {
        self.get(keys::STAGE_NAME).and_then(|v| v.as_str())
    }

    /// Record the identity of the stage invocation about to run
    pub fn set_stage(&mut self, identity: &StageIdentity) {
        self.insert(keys::STAGE_NAME, serde_json::json!(identity.name()));
        self.insert(keys::STAGE_ID, serde_json::json!(identity.id().to_string()));
    }

    /// Get the current stage invocation id
    pub fn stage_id(&self) -> Option<&str> {
        self.get(keys::STAGE_ID).and_then(|v| v.as_str())
    }

    /// Store the symbols under analysis
    pub fn set_symbols(&mut self, symbols: &SymbolSet) {
        self.insert(keys::SYMBOLS, serde_json::json!(symbols.to_string()));
    }

    /// Get the symbols under analysis, parsed back into a set
    pub fn symbols(&self) -> Option<SymbolSet> {
        self.get(keys::SYMBOLS)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    // =========== Generic Key-Value Operations ===========

    /// Insert a value into the context
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Get a value from the context
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Insert a typed value into the context
    pub fn insert_typed<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> crate::Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| {
            crate::Error::ProcessingFailed(format!("Failed to serialize context value: {e}"))
        })?;
        self.data.insert(key.into(), json_value);
        Ok(())
    }

    /// Get a typed value from the context
    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(value) => {
                let typed = serde_json::from_value(value.clone()).map_err(|e| {
                    crate::Error::ProcessingFailed(format!(
                        "Failed to deserialize context value: {e}"
                    ))
                })?;
                Ok(Some(typed))
            }
        }
    }

    /// Check if a key exists in the context
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Remove a value from the context
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// Get the number of entries in the context
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the context is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
