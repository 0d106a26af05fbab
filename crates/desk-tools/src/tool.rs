//! Tool trait definition

use async_trait::async_trait;
use desk_core::Result;
use serde_json::Value;

/// Trait for tools that stages can execute
///
/// Each tool provides a name, a description and a JSON schema for its input.
/// Tools that produce plain text return a `Value::String`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with given parameters
    ///
    /// `params` should match [`Tool::input_schema`].
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Get the tool's name
    ///
    /// Must be unique within a [`ToolRegistry`](crate::ToolRegistry).
    fn name(&self) -> &str;

    /// Get the tool's description, shown to the model
    fn description(&self) -> &str;

    /// Get the tool's input schema (JSON Schema format)
    ///
    /// # Example
    ///
    /// ```
    /// use serde_json::json;
    ///
    /// let schema = json!({
    ///     "type": "object",
    ///     "properties": {
    ///         "symbol": { "type": "string" },
    ///         "quarterly": { "type": "boolean" }
    ///     },
    ///     "required": ["symbol"]
    /// });
    /// ```
    fn input_schema(&self) -> Value;
}
