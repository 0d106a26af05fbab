//! Concrete provider implementations

pub mod openai;

pub use openai::{ApiFlavor, OpenAIConfig, OpenAIProvider};
