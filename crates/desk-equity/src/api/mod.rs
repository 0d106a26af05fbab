//! Market data source boundary
//!
//! A [`MarketDataSource`] hands out one [`SymbolClient`] per ticker. Client
//! methods are blocking; callers run them on `spawn_blocking` workers.

mod memory;
mod yahoo;

pub use memory::{Fixture, MemorySource, StatementPair};
pub use yahoo::{YahooConfig, YahooSource};

use desk_core::Symbol;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::SourceResult;
use crate::report::Table;

/// Reporting frequency of a financial statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Annual,
    Quarterly,
}

impl Frequency {
    pub fn from_quarterly(quarterly: bool) -> Self {
        if quarterly { Self::Quarterly } else { Self::Annual }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Annual => "Annual",
            Self::Quarterly => "Quarterly",
        }
    }
}

/// A news headline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub link: Option<String>,
}

/// Calls and puts for one expiration date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionChain {
    pub expiration_date: String,
    pub calls: Table,
    pub puts: Table,
}

/// Blocking access to the data of one ticker
#[cfg_attr(test, mockall::automock)]
pub trait SymbolClient: Send + Sync {
    /// Daily price bars over a lookback period such as `1d` or `1y`
    fn history(&self, period: &str) -> SourceResult<Table>;

    /// Flat map of company profile and valuation fields
    fn info(&self) -> SourceResult<Map<String, Value>>;

    /// Recent headlines, newest first
    fn news(&self) -> SourceResult<Vec<NewsItem>>;

    fn financials(&self, frequency: Frequency) -> SourceResult<Table>;

    fn balance_sheet(&self, frequency: Frequency) -> SourceResult<Table>;

    fn cash_flow(&self, frequency: Frequency) -> SourceResult<Table>;

    fn major_holders(&self) -> SourceResult<Table>;

    fn institutional_holders(&self) -> SourceResult<Table>;

    /// Analyst recommendation counts, oldest period first
    fn recommendations(&self) -> SourceResult<Table>;

    fn sustainability(&self) -> SourceResult<Table>;

    /// Option expiration dates (`YYYY-MM-DD`), nearest first
    fn option_expirations(&self) -> SourceResult<Vec<String>>;

    fn option_chain(&self, expiration: &str) -> SourceResult<OptionChain>;
}

/// Factory of per-symbol clients
#[cfg_attr(test, mockall::automock)]
pub trait MarketDataSource: Send + Sync {
    /// Open a client for `symbol`.
    ///
    /// Connecting does not validate the ticker; callers probe it.
    fn connect(&self, symbol: &Symbol) -> SourceResult<Arc<dyn SymbolClient>>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency() {
        assert_eq!(Frequency::from_quarterly(true), Frequency::Quarterly);
        assert_eq!(Frequency::from_quarterly(false), Frequency::Annual);
        assert_eq!(Frequency::Quarterly.label(), "Quarterly");
        assert_eq!(Frequency::Annual.label(), "Annual");
    }
}
