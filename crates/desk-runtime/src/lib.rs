//! Stage runtime for equity-desk
//!
//! A [`StageRunner`] binds a role instruction and a capability set to a
//! [`ReasoningEngine`]. The production engine is [`AgentExecutor`], which runs
//! the model/tool loop against an [`LLMProvider`](desk_llm::LLMProvider).

pub mod engine;
pub mod executor;
pub mod stage;

pub use engine::ReasoningEngine;
pub use executor::{AgentExecutor, AgentExecutorBuilder, ExecutorConfig};
pub use stage::StageRunner;
