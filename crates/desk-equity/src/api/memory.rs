//! In-memory market data source
//!
//! Serves fixed fixtures. Used by tests and by offline runs of the desk.

use desk_core::{Symbol, SymbolSet};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Frequency, MarketDataSource, NewsItem, OptionChain, SymbolClient};
use crate::error::{SourceError, SourceResult};
use crate::report::Table;

/// Annual and quarterly versions of one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementPair {
    pub annual: Table,
    pub quarterly: Table,
}

impl StatementPair {
    pub fn get(&self, frequency: Frequency) -> &Table {
        match frequency {
            Frequency::Annual => &self.annual,
            Frequency::Quarterly => &self.quarterly,
        }
    }
}

/// Everything the source knows about one ticker
///
/// A default fixture has no price history, so the ticker fails its probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fixture {
    pub history: Table,
    pub info: Map<String, Value>,
    pub news: Vec<NewsItem>,
    pub financials: StatementPair,
    pub balance_sheet: StatementPair,
    pub cash_flow: StatementPair,
    pub major_holders: Table,
    pub institutional_holders: Table,
    pub recommendations: Table,
    pub sustainability: Table,
    /// Chains by expiration, nearest first
    pub option_chains: Vec<OptionChain>,
}

impl Fixture {
    /// Plausible, deterministic data for `symbol`
    pub fn sample(symbol: &Symbol) -> Self {
        let seed: u32 = symbol.as_str().bytes().map(u32::from).sum();
        let base = 50.0 + f64::from(seed % 400);

        let mut history = Table::new("Date", ["Open", "High", "Low", "Close", "Volume"]);
        for day in 0..10_u32 {
            let open = base + f64::from(day);
            history.push_row(
                format!("2024-06-{:02}", day + 3),
                vec![
                    json!(open),
                    json!(open + 2.5),
                    json!(open - 1.5),
                    json!(open + 1.0),
                    json!(1_000_000 + u64::from(seed) * 1000 + u64::from(day) * 10_000),
                ],
            );
        }

        let mut info = Map::new();
        info.insert("longName".to_string(), json!(format!("{symbol} Corporation")));
        info.insert("sector".to_string(), json!("Technology"));
        info.insert("marketCap".to_string(), json!(u64::from(seed) * 1_000_000_000));
        info.insert("trailingPE".to_string(), json!(20.0 + f64::from(seed % 15)));
        info.insert("dividendYield".to_string(), json!(0.0052));

        let mut chain = OptionChain {
            expiration_date: "2024-06-21".to_string(),
            calls: Table::new("contractSymbol", ["strike", "lastPrice", "volume", "openInterest"]),
            puts: Table::new("contractSymbol", ["strike", "lastPrice", "volume", "openInterest"]),
        };
        for step in 0..4_u32 {
            let strike = (base / 5.0).round() * 5.0 + f64::from(step) * 5.0;
            let values = |premium: f64| vec![json!(strike), json!(premium), json!(100 + step * 25), json!(1000 + step * 50)];
            chain.calls.push_row(format!("{symbol}240621C{step:05}"), values(4.0 - f64::from(step)));
            chain.puts.push_row(format!("{symbol}240621P{step:05}"), values(1.0 + f64::from(step)));
        }
        let later = OptionChain {
            expiration_date: "2024-06-28".to_string(),
            ..chain.clone()
        };

        Self {
            history,
            info,
            news: vec![NewsItem {
                title: Some(format!("{symbol} beats quarterly estimates")),
                publisher: Some("Market Wire".to_string()),
                link: None,
            }],
            financials: statement_pair(base, &[("Total Revenue", 1.0e6), ("Net Income", 2.0e5)]),
            balance_sheet: statement_pair(base, &[("Total Assets", 3.0e6), ("Total Debt", 8.0e5)]),
            cash_flow: statement_pair(base, &[("Operating Cash Flow", 3.0e5), ("Free Cash Flow", 2.2e5)]),
            major_holders: Table::new("Breakdown", ["Value"])
                .with_row("insidersPercentHeld", vec![json!(0.02)])
                .with_row("institutionsPercentHeld", vec![json!(0.61)]),
            institutional_holders: (1..=6).fold(
                Table::new("Holder", ["Shares", "% Out"]),
                |table, n| table.with_row(format!("Fund {n}"), vec![json!(1_000_000 * (7 - n)), json!(0.01 * f64::from(7 - n))]),
            ),
            recommendations: ["-3m", "-2m", "-1m", "0m"].iter().zip(0_u32..).fold(
                Table::new("period", ["strongBuy", "buy", "hold", "sell", "strongSell"]),
                |table, (period, n)| table.with_row(*period, vec![json!(5 + n), json!(12), json!(8 - n), json!(1), json!(0)]),
            ),
            sustainability: Table::new("esgScores", ["Value"])
                .with_row("totalEsg", vec![json!(17.2)])
                .with_row("environmentScore", vec![json!(0.6)]),
            option_chains: vec![chain, later],
        }
    }
}

fn statement_pair(base: f64, items: &[(&str, f64)]) -> StatementPair {
    StatementPair {
        annual: statement(base, items, &["2023-12-31", "2022-12-31"]),
        quarterly: statement(base, items, &["2024-03-31", "2023-12-31", "2023-09-30"]),
    }
}

fn statement(base: f64, items: &[(&str, f64)], periods: &[&str]) -> Table {
    let mut table = Table::new("Breakdown", periods.iter().copied());
    for (label, scale) in items {
        let values = (0_u32..)
            .take(periods.len())
            .map(|age| json!((base * scale * (1.0 - 0.05 * f64::from(age))).round()))
            .collect();
        table.push_row(*label, values);
    }
    table
}

/// Market data source backed by in-memory fixtures
#[derive(Debug, Default)]
pub struct MemorySource {
    fixtures: HashMap<Symbol, Arc<Fixture>>,
    connects: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample fixtures for every symbol in `symbols`
    pub fn sample(symbols: &SymbolSet) -> Self {
        symbols
            .iter()
            .fold(Self::new(), |source, symbol| source.with_fixture(symbol.clone(), Fixture::sample(symbol)))
    }

    #[must_use]
    pub fn with_fixture(mut self, symbol: Symbol, fixture: Fixture) -> Self {
        self.fixtures.insert(symbol, Arc::new(fixture));
        self
    }

    /// Number of clients handed out so far
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl MarketDataSource for MemorySource {
    fn connect(&self, symbol: &Symbol) -> SourceResult<Arc<dyn SymbolClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let fixture = self.fixtures.get(symbol).cloned().unwrap_or_default();
        Ok(Arc::new(MemoryClient { fixture }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryClient {
    fixture: Arc<Fixture>,
}

/// Number of trailing rows a `<n>d` lookback selects; other periods return
/// the whole series.
fn lookback_rows(period: &str) -> Option<usize> {
    period.strip_suffix('d')?.parse().ok()
}

impl SymbolClient for MemoryClient {
    fn history(&self, period: &str) -> SourceResult<Table> {
        Ok(match lookback_rows(period) {
            Some(n) => self.fixture.history.tail(n),
            None => self.fixture.history.clone(),
        })
    }

    fn info(&self) -> SourceResult<Map<String, Value>> {
        Ok(self.fixture.info.clone())
    }

    fn news(&self) -> SourceResult<Vec<NewsItem>> {
        Ok(self.fixture.news.clone())
    }

    fn financials(&self, frequency: Frequency) -> SourceResult<Table> {
        Ok(self.fixture.financials.get(frequency).clone())
    }

    fn balance_sheet(&self, frequency: Frequency) -> SourceResult<Table> {
        Ok(self.fixture.balance_sheet.get(frequency).clone())
    }

    fn cash_flow(&self, frequency: Frequency) -> SourceResult<Table> {
        Ok(self.fixture.cash_flow.get(frequency).clone())
    }

    fn major_holders(&self) -> SourceResult<Table> {
        Ok(self.fixture.major_holders.clone())
    }

    fn institutional_holders(&self) -> SourceResult<Table> {
        Ok(self.fixture.institutional_holders.clone())
    }

    fn recommendations(&self) -> SourceResult<Table> {
        Ok(self.fixture.recommendations.clone())
    }

    fn sustainability(&self) -> SourceResult<Table> {
        Ok(self.fixture.sustainability.clone())
    }

    fn option_expirations(&self) -> SourceResult<Vec<String>> {
        Ok(self
            .fixture
            .option_chains
            .iter()
            .map(|chain| chain.expiration_date.clone())
            .collect())
    }

    fn option_chain(&self, expiration: &str) -> SourceResult<OptionChain> {
        self.fixture
            .option_chains
            .iter()
            .find(|chain| chain.expiration_date == expiration)
            .cloned()
            .ok_or_else(|| SourceError::NoData(format!("no option chain for {expiration}")))
    }
}
