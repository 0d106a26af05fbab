//! Pipeline definition and execution

use desk_core::{Agent, Context, Error, Result, StageIdentity};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{error, info, instrument};

/// Execution state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    /// Index of the stage currently executing
    Running(usize),
    Completed,
    /// Index of the stage that failed
    Failed(usize),
}

/// Output of one stage invocation
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub identity: StageIdentity,
    pub output: String,
}

/// Result of a completed run, stage outputs in execution order
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: String,
    pub records: Vec<StageRecord>,
}

impl PipelineRun {
    /// Output of the last stage
    pub fn final_output(&self) -> Option<&str> {
        self.records.last().map(|r| r.output.as_str())
    }
}

struct StageEntry {
    agent: Arc<dyn Agent>,
    /// Indices of earlier stages whose outputs this stage receives
    inputs: Vec<usize>,
}

/// A fixed sequence of stages
///
/// Each stage declares which earlier stages it reads from, so the stage list
/// is a topological order of the dependency graph and runs strictly one
/// stage at a time. A stage receives the run input followed by the raw output
/// of each of its dependencies. Any stage failure aborts the run.
///
/// # Example
///
/// ```no_run
/// use desk_core::{Agent, Context};
/// use desk_workflow::Pipeline;
/// use std::sync::Arc;
///
/// # async fn example(analyst: Arc<dyn Agent>, ranker: Arc<dyn Agent>) -> desk_core::Result<()> {
/// let pipeline = Pipeline::builder()
///     .then(analyst)
///     .then(ranker)
///     .build()?;
///
/// let run = pipeline.run("Company name: AAPL, MSFT".to_string(), Context::new()).await?;
/// assert_eq!(run.records.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    stages: Vec<StageEntry>,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// State after the most recent transition
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.agent.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn transition(&self, next: PipelineState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Run every stage in order
    ///
    /// Each invocation gets a freshly minted [`StageIdentity`], recorded in the
    /// context before the stage runs.
    #[instrument(skip_all, fields(run_id = context.run_id().unwrap_or("-"), stages = self.stages.len()))]
    pub async fn run(&self, input: String, mut context: Context) -> Result<PipelineRun> {
        let run_id = context.run_id().map(str::to_string).unwrap_or_default();
        let mut records: Vec<StageRecord> = Vec::with_capacity(self.stages.len());

        for (index, stage) in self.stages.iter().enumerate() {
            self.transition(PipelineState::Running(index));

            let identity = StageIdentity::new(stage.agent.name());
            context.set_stage(&identity);
            let stage_input = compose_input(&input, stage.inputs.iter().map(|&i| &records[i]));

            info!(stage = %identity.name(), index, "Stage started");
            let started = Instant::now();

            match stage.agent.process(stage_input, &mut context).await {
                Ok(output) => {
                    info!(
                        stage = %identity.name(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        output_length = output.len(),
                        "Stage finished"
                    );
                    records.push(StageRecord { identity, output });
                }
                Err(e) => {
                    error!(stage = %identity.name(), error = %e, "Stage failed, aborting pipeline");
                    self.transition(PipelineState::Failed(index));
                    return Err(match e {
                        stage_err @ Error::StageFailed { .. } => stage_err,
                        other => Error::stage_failed(identity.name(), other),
                    });
                }
            }
        }

        self.transition(PipelineState::Completed);
        Ok(PipelineRun { run_id, records })
    }
}

fn compose_input<'a>(base: &str, upstream: impl Iterator<Item = &'a StageRecord>) -> String {
    let mut composed = base.to_string();
    for record in upstream {
        if !composed.is_empty() {
            composed.push_str("\n\n");
        }
        composed.push_str(&record.output);
    }
    composed
}

/// Builder for constructing pipelines
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<StageEntry>,
    error: Option<Error>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage that reads only the run input
    pub fn stage(mut self, agent: Arc<dyn Agent>) -> Self {
        self.stages.push(StageEntry {
            agent,
            inputs: Vec::new(),
        });
        self
    }

    /// Add a stage that reads the output of the previously added stage
    pub fn then(mut self, agent: Arc<dyn Agent>) -> Self {
        let inputs = self.stages.len().checked_sub(1).into_iter().collect();
        self.stages.push(StageEntry { agent, inputs });
        self
    }

    /// Add a stage that reads the outputs of the named earlier stages
    pub fn stage_with_inputs(mut self, agent: Arc<dyn Agent>, upstream: &[&str]) -> Self {
        let mut inputs = Vec::with_capacity(upstream.len());
        for name in upstream {
            match self.stages.iter().position(|s| s.agent.name() == *name) {
                Some(index) => inputs.push(index),
                None if self.error.is_none() => {
                    self.error = Some(Error::InitializationFailed(format!(
                        "Stage '{}' depends on '{name}', which is not an earlier stage",
                        agent.name()
                    )));
                }
                None => {}
            }
        }
        self.stages.push(StageEntry { agent, inputs });
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.stages.is_empty() {
            return Err(Error::InitializationFailed(
                "Pipeline needs at least one stage".to_string(),
            ));
        }
        Ok(Pipeline {
            stages: self.stages,
            state: Mutex::new(PipelineState::Idle),
        })
    }
}
