//! The reasoning capability seam

use async_trait::async_trait;
use desk_core::Result;
use desk_tools::ToolRegistry;

/// Something that turns an instruction plus input text into an answer,
/// optionally calling tools from the given capability set along the way.
///
/// Implementations must not interpret the answer; it is passed downstream
/// verbatim.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn reason(
        &self,
        instruction: &str,
        input: &str,
        capabilities: &ToolRegistry,
    ) -> Result<String>;
}
