//! Stage runner: one role-scoped unit of reasoning work

use crate::ReasoningEngine;
use async_trait::async_trait;
use desk_core::{Agent, Context, Result};
use desk_tools::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Binds a role instruction and a capability set to a reasoning engine
///
/// The runner hands the engine its instruction and the accumulated input,
/// and returns whatever text comes back without interpreting it.
///
/// ```no_run
/// use desk_core::{Agent, Context};
/// use desk_runtime::{AgentExecutor, StageRunner};
/// use desk_tools::ToolRegistry;
/// use std::sync::Arc;
///
/// # async fn example(executor: AgentExecutor) -> desk_core::Result<()> {
/// let analyst = StageRunner::new(
///     "Stock Analyst",
///     "Gather market data for each company.",
///     Arc::new(ToolRegistry::new()),
///     Arc::new(executor),
/// );
/// let mut ctx = Context::new();
/// let report = analyst.process("Company name: AAPL".to_string(), &mut ctx).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StageRunner {
    name: String,
    instruction: String,
    capabilities: Arc<ToolRegistry>,
    engine: Arc<dyn ReasoningEngine>,
}

impl StageRunner {
    pub fn new(
        name: impl Into<String>,
        instruction: impl Into<String>,
        capabilities: Arc<ToolRegistry>,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            capabilities,
            engine,
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn capabilities(&self) -> &ToolRegistry {
        &self.capabilities
    }
}

#[async_trait]
impl Agent for StageRunner {
    #[instrument(skip_all, fields(stage = %self.name, stage_id = context.stage_id().unwrap_or("-")))]
    async fn process(&self, input: String, context: &mut Context) -> Result<String> {
        debug!(
            input_length = input.len(),
            tool_count = self.capabilities.len(),
            "Running stage"
        );
        self.engine
            .reason(&self.instruction, &input, &self.capabilities)
            .await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockReasoningEngine;
    use desk_core::Error;

    #[tokio::test]
    async fn test_forwards_instruction_and_input_verbatim() {
        let mut engine = MockReasoningEngine::new();
        engine
            .expect_reason()
            .withf(|instruction, input, caps| {
                instruction.to_string() == "Rank the companies."
                    && input.to_string() == "### Market Research\nAAPL leads."
                    && caps.is_empty()
            })
            .times(1)
            .returning(|_, _, _| Ok("### Company Ranking\n1. AAPL".to_string()));

        let runner = StageRunner::new(
            "Research Analyst",
            "Rank the companies.",
            Arc::new(ToolRegistry::new()),
            Arc::new(engine),
        );
        let mut ctx = Context::new();
        let out = runner
            .process("### Market Research\nAAPL leads.".to_string(), &mut ctx)
            .await
            .unwrap();

        assert_eq!(out, "### Company Ranking\n1. AAPL");
        assert_eq!(runner.name(), "Research Analyst");
        assert_eq!(runner.instruction(), "Rank the companies.");
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let mut engine = MockReasoningEngine::new();
        engine
            .expect_reason()
            .returning(|_, _, _| Err(Error::ProcessingFailed("backend down".into())));

        let runner = StageRunner::new(
            "Investment Lead",
            "x",
            Arc::new(ToolRegistry::new()),
            Arc::new(engine),
        );
        let mut ctx = Context::new();
        assert!(runner.process(String::new(), &mut ctx).await.is_err());
    }
}
