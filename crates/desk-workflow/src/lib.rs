//! Stage orchestration for equity-desk
//!
//! A [`Pipeline`] runs a fixed, ordered list of stages, feeding each stage
//! the raw outputs of the stages it depends on. The [`aggregate`] module turns
//! the finished run into a single Markdown document.

pub mod aggregate;
pub mod pipeline;

pub use aggregate::{ParsedStageOutput, Section, parse_stage_outputs, render_markdown, write_markdown};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineRun, PipelineState, StageRecord};
