//! Reasoning backend abstraction for equity-desk
//!
//! Provider-agnostic chat completion types (messages, tool definitions,
//! requests and responses), the [`LLMProvider`] trait and, behind the
//! `openai` feature, a provider for OpenAI-compatible endpoints including
//! Azure OpenAI deployments.

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod tools;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role, ToolCall};
pub use provider::LLMProvider;
pub use tools::ToolDefinition;

#[cfg(feature = "openai")]
pub mod providers;
