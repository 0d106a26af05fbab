//! Tool framework for equity-desk
//!
//! A [`Tool`] is a named, schema-described operation a reasoning stage may
//! call. A [`ToolRegistry`] is the ordered capability set handed to a stage.

pub mod registry;
pub mod tool;

pub use registry::ToolRegistry;
pub use tool::Tool;
