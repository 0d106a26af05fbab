//! Model/tool loop
//!
//! The AgentExecutor implements the tool-calling loop:
//! 1. Call the model with the conversation and the capability set
//! 2. If it requested tools, execute them and append the results
//! 3. Repeat until the model ends its turn or the iteration cap is hit

use crate::ReasoningEngine;
use async_trait::async_trait;
use desk_core::{Error, Result};
use desk_llm::{
    CompletionRequest, ContentBlock, LLMProvider, Message, StopReason, TokenUsage, ToolCall,
    ToolDefinition,
};
use desk_tools::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the tool loop
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of model calls for one `reason` invocation
    pub max_iterations: usize,
    /// Model or deployment name
    pub model: String,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 12,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: Some(0.2),
        }
    }
}

/// Runs the model/tool loop against an [`LLMProvider`]
pub struct AgentExecutor {
    provider: Arc<dyn LLMProvider>,
    config: ExecutorConfig,
}

impl AgentExecutor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: ExecutorConfig) -> Self {
        Self { provider, config }
    }

    pub fn builder() -> AgentExecutorBuilder {
        AgentExecutorBuilder::new()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the loop with `system` as the system prompt and `user` as the
    /// opening user turn.
    pub async fn run(&self, system: &str, user: &str, tools: &ToolRegistry) -> Result<String> {
        let definitions = tool_definitions(tools);
        let mut conversation = vec![Message::user(user)];
        let mut usage = TokenUsage::default();

        for iteration in 1..=self.config.max_iterations {
            debug!(
                iteration,
                max_iterations = self.config.max_iterations,
                tool_count = definitions.len(),
                "Sending request to model"
            );

            let mut builder = CompletionRequest::builder(&self.config.model)
                .messages(conversation.clone())
                .system(system)
                .max_tokens(self.config.max_tokens)
                .tools(definitions.clone());
            if let Some(temperature) = self.config.temperature {
                builder = builder.temperature(temperature);
            }

            let response = self.provider.complete(builder.build()).await?;
            usage.add(response.usage);

            let calls = response.message.tool_calls();
            let text = response.message.text();
            conversation.push(response.message);

            match response.stop_reason {
                StopReason::ToolUse if !calls.is_empty() => {
                    info!(iteration, tool_count = calls.len(), "Model requested tools");
                    let results = execute_calls(tools, calls).await;
                    conversation.push(Message::tool_results(results));
                }
                StopReason::ToolUse => {
                    warn!(iteration, "Tool use signalled without tool calls");
                    return Ok(text);
                }
                StopReason::MaxTokens => {
                    warn!(iteration, "Model output truncated at token limit");
                    return Ok(text);
                }
                StopReason::EndTurn => {
                    info!(
                        iteration,
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        response_length = text.len(),
                        "Model finished"
                    );
                    return Ok(text);
                }
            }
        }

        Err(Error::ProcessingFailed(format!(
            "no final answer after {} iterations",
            self.config.max_iterations
        )))
    }
}

#[async_trait]
impl ReasoningEngine for AgentExecutor {
    async fn reason(
        &self,
        instruction: &str,
        input: &str,
        capabilities: &ToolRegistry,
    ) -> Result<String> {
        self.run(instruction, input, capabilities).await
    }
}

fn tool_definitions(tools: &ToolRegistry) -> Vec<ToolDefinition> {
    tools
        .list_tools()
        .iter()
        .map(|tool| ToolDefinition::new(tool.name(), tool.description(), tool.input_schema()))
        .collect()
}

/// Execute one round of tool calls in order. Failures, including unknown
/// tool names, are reported back to the model as error results.
async fn execute_calls(tools: &ToolRegistry, calls: Vec<ToolCall>) -> Vec<ContentBlock> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let started = Instant::now();
        match tools.invoke(&call.name, call.input).await {
            Ok(value) => {
                let content = render_tool_output(value);
                debug!(
                    tool = %call.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    result_length = content.len(),
                    "Tool succeeded"
                );
                results.push(ContentBlock::tool_result(call.id, content));
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool failed");
                results.push(ContentBlock::tool_error(call.id, format!("Error: {e}")));
            }
        }
    }
    results
}

/// Text tools are passed through untouched; anything else as JSON
fn render_tool_output(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Builder for [`AgentExecutor`]
#[derive(Default)]
pub struct AgentExecutorBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    config: ExecutorConfig,
}

impl AgentExecutorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn build(self) -> Result<AgentExecutor> {
        let provider = self
            .provider
            .ok_or_else(|| Error::InitializationFailed("Provider not set".to_string()))?;
        if self.config.max_iterations == 0 {
            return Err(Error::InitializationFailed(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(AgentExecutor::new(provider, self.config))
    }
}
