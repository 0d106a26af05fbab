//! Core Agent trait definition

use crate::{Context, Result};
use async_trait::async_trait;

/// A unit of work that turns accumulated text context into new text.
///
/// Pipeline stages implement this trait. The input is everything the stage is
/// allowed to see; the output is handed verbatim to the stages that depend on
/// it.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Process input and return output
    async fn process(&self, input: String, context: &mut Context) -> Result<String>;

    /// Get the agent's name
    fn name(&self) -> &str;
}
