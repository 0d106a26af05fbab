//! OpenAI-compatible chat completions provider
//!
//! Speaks the `/chat/completions` wire format used by OpenAI, Azure OpenAI
//! deployments and most local inference servers.
//!
//! ```no_run
//! use desk_llm::{CompletionRequest, LLMProvider, Message};
//! use desk_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OpenAIConfig::azure("key", "https://my-resource.openai.azure.com", "2024-06-01");
//! let provider = OpenAIProvider::with_config(config)?;
//!
//! let request = CompletionRequest::builder("gpt-4o-mini")
//!     .add_message(Message::user("Hello!"))
//!     .build();
//! let response = provider.complete(request).await?;
//! println!("{}", response.message.text());
//! # Ok(())
//! # }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMError, LLMProvider, Message,
    MessageContent, Result, Role, StopReason, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use desk_utils::env_var;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Which dialect of the API to speak
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFlavor {
    /// Bearer token, `{base}/chat/completions`
    OpenAI,
    /// `api-key` header, `{base}/openai/deployments/{model}/chat/completions?api-version=..`
    Azure { api_version: String },
}

/// Configuration for [`OpenAIProvider`]
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub api_base: String,
    pub flavor: ApiFlavor,
    pub timeout_secs: u64,
}

impl OpenAIConfig {
    /// OpenAI endpoint with default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            flavor: ApiFlavor::OpenAI,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Azure OpenAI resource; the request model names the deployment
    pub fn azure(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: api_base.into(),
            flavor: ApiFlavor::Azure {
                api_version: api_version.into(),
            },
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from the environment
    ///
    /// `AZURE_API_KEY` selects Azure (with `AZURE_API_BASE` required and
    /// `AZURE_API_VERSION` optional). Otherwise `OPENAI_API_KEY` is required
    /// and `OPENAI_API_BASE` optional.
    pub fn from_env() -> Result<Self> {
        if let Some(api_key) = env_var("AZURE_API_KEY") {
            let api_base = env_var("AZURE_API_BASE").ok_or_else(|| {
                LLMError::ConfigurationError(
                    "AZURE_API_BASE must be set when AZURE_API_KEY is".to_string(),
                )
            })?;
            let api_version = env_var("AZURE_API_VERSION")
                .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());
            return Ok(Self::azure(api_key, api_base, api_version));
        }

        let api_key = env_var("OPENAI_API_KEY").ok_or_else(|| {
            LLMError::ConfigurationError(
                "neither AZURE_API_KEY nor OPENAI_API_KEY is set".to_string(),
            )
        })?;
        let mut config = Self::new(api_key);
        if let Some(base) = env_var("OPENAI_API_BASE") {
            config.api_base = base;
        }
        Ok(config)
    }

    /// Set custom API base URL (local servers, proxies)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn endpoint(&self, model: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        match &self.flavor {
            ApiFlavor::OpenAI => format!("{base}/chat/completions"),
            ApiFlavor::Azure { api_version } => format!(
                "{base}/openai/deployments/{model}/chat/completions?api-version={api_version}"
            ),
        }
    }
}

/// Provider for OpenAI-compatible chat completion endpoints
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Create a provider from the environment, see [`OpenAIConfig::from_env`]
    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(provider = self.name(), model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatRequest {
            model: request.model.clone(),
            messages: to_wire_messages(request.system, request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: request.tools.iter().map(WireTool::from).collect(),
        };

        let http = self.client.post(self.config.endpoint(&request.model));
        let http = match self.config.flavor {
            ApiFlavor::OpenAI => http.bearer_auth(&self.config.api_key),
            ApiFlavor::Azure { .. } => http.header("api-key", &self.config.api_key),
        };
        let response = http.json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(match status.as_u16() {
                401 | 403 => LLMError::AuthenticationFailed,
                429 => LLMError::RateLimitExceeded(error_text),
                400 => LLMError::InvalidRequest(error_text),
                404 => LLMError::ModelNotFound(request.model),
                _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LLMError::UnexpectedResponse(format!("Failed to parse response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

        let usage = parsed.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });
        debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("none"),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Completion received"
        );

        Ok(CompletionResponse {
            message: from_wire_message(choice.message)?,
            stop_reason: map_finish_reason(choice.finish_reason.as_deref()),
            usage,
        })
    }

    fn name(&self) -> &str {
        match self.config.flavor {
            ApiFlavor::OpenAI => "openai",
            ApiFlavor::Azure { .. } => "azure",
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for WireTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

// ============================================================================
// Conversion
// ============================================================================

/// System prompt goes first; tool results become separate `tool` messages
fn to_wire_messages(system: Option<String>, messages: Vec<Message>) -> Vec<WireMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system {
        out.push(WireMessage::text("system", system));
    }

    for msg in messages {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        match msg.content {
            MessageContent::Text(text) => out.push(WireMessage::text(role, text)),
            MessageContent::Blocks(blocks) => {
                let mut texts = Vec::new();
                let mut tool_calls = Vec::new();
                let mut results = Vec::new();
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => texts.push(text),
                        ContentBlock::ToolUse { id, name, input } => tool_calls.push(WireToolCall {
                            id,
                            kind: function_type(),
                            function: WireFunctionCall {
                                name,
                                arguments: input.to_string(),
                            },
                        }),
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => results.push(WireMessage {
                            role: "tool",
                            content: Some(content),
                            tool_calls: Vec::new(),
                            tool_call_id: Some(tool_use_id),
                        }),
                    }
                }
                if !texts.is_empty() || !tool_calls.is_empty() {
                    out.push(WireMessage {
                        role,
                        content: (!texts.is_empty()).then(|| texts.join("\n")),
                        tool_calls,
                        tool_call_id: None,
                    });
                }
                out.extend(results);
            }
        }
    }
    out
}

fn from_wire_message(msg: ChatResponseMessage) -> Result<Message> {
    let mut blocks = Vec::new();
    if let Some(text) = msg.content.filter(|t| !t.is_empty()) {
        blocks.push(ContentBlock::Text { text });
    }
    for call in msg.tool_calls {
        let input = if call.function.arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                LLMError::UnexpectedResponse(format!(
                    "Invalid arguments for tool '{}': {e}",
                    call.function.name
                ))
            })?
        };
        blocks.push(ContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }
    Ok(Message::blocks(Role::Assistant, blocks))
}

fn map_finish_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls" | "function_call") => StopReason::ToolUse,
        Some("content_filter") => {
            debug!("Content filtered by provider safety systems");
            StopReason::EndTurn
        }
        _ => StopReason::EndTurn,
    }
}
