//! Equity research desk
//!
//! This crate wires market data into a three-stage reasoning pipeline:
//!
//! - [`api`]: the blocking market data boundary, with a Yahoo Finance source
//!   and an in-memory source for tests and offline runs
//! - [`FinanceFacade`]: twelve failure-tolerant report categories over a
//!   source, with a per-run client cache
//! - [`tools`]: the categories exposed as model-callable tools
//! - [`ResearchDesk`]: Stock Analyst, Research Analyst and Investment Lead
//!   stages run in order, their sections collected into one Markdown document
//!
//! # Example
//!
//! ```rust,ignore
//! use desk_equity::{DeskConfig, ResearchDesk, YahooSource};
//! use desk_runtime::AgentExecutor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DeskConfig::from_env()?;
//!     let source = Arc::new(YahooSource::new(&config.yahoo_config())?);
//!     let engine = Arc::new(AgentExecutor::new(/* your provider */, config.executor_config()));
//!
//!     let desk = ResearchDesk::new(source, engine, config)?;
//!     let symbols = "AAPL, MSFT, GOOGL".parse()?;
//!     desk.run_to_file(&symbols, "result.md").await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod desk;
pub mod error;
pub mod facade;
pub mod prompts;
pub mod report;
pub mod tools;

pub use api::{MarketDataSource, MemorySource, SymbolClient, YahooConfig, YahooSource};
pub use config::DeskConfig;
pub use desk::{DEFAULT_SYMBOLS, ResearchDesk, SCENARIOS, scenario};
pub use error::{EquityError, Result, SourceError, Unavailable};
pub use facade::FinanceFacade;
pub use tools::{ReportKind, ReportTool, capability_set};
