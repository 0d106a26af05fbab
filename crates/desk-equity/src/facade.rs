//! Failure-tolerant access to market data
//!
//! [`FinanceFacade`] turns a blocking [`MarketDataSource`] into twelve
//! report categories. Every report method returns a titled text block and
//! never fails: invalid tickers, remote errors, panics and empty payloads all
//! degrade to `Data not available.` so a reasoning stage always gets an
//! answer it can work with.

use desk_core::Symbol;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::api::{Frequency, MarketDataSource, OptionChain, SymbolClient};
use crate::cache::ClientCache;
use crate::error::{SourceResult, Unavailable};
use crate::report::{ReportValue, Table, format_block, group_thousands, unavailable};

/// Lookback used when a history request names no period
pub const DEFAULT_HISTORY_PERIOD: &str = "1y";

/// Headline shown when the first news item has no title
pub const NO_NEWS_TITLE: &str = "No title in news content.";

const PROBE_PERIOD: &str = "1d";
const SECTION_RULE: &str = "------------------------------------------------------------";

/// Report categories over one market data source
pub struct FinanceFacade {
    source: Arc<dyn MarketDataSource>,
    cache: ClientCache,
    default_period: String,
}

impl FinanceFacade {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            cache: ClientCache::new(),
            default_period: DEFAULT_HISTORY_PERIOD.to_string(),
        }
    }

    #[must_use]
    pub fn with_default_period(mut self, period: impl Into<String>) -> Self {
        self.default_period = period.into();
        self
    }

    pub fn default_period(&self) -> &str {
        &self.default_period
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Symbols resolved so far, in resolution order
    pub async fn cached_symbols(&self) -> Vec<Symbol> {
        self.cache.symbols().await
    }

    /// Resolve a client for `symbol`, probing one day of history on a miss.
    ///
    /// Only clients that pass the probe are cached.
    pub async fn resolve(&self, symbol: &Symbol) -> Result<Arc<dyn SymbolClient>, Unavailable> {
        self.cache
            .get_or_resolve(symbol, || async {
                let source = Arc::clone(&self.source);
                let owned = symbol.clone();
                let probe = tokio::task::spawn_blocking(move || -> SourceResult<Option<Arc<dyn SymbolClient>>> {
                    let client = source.connect(&owned)?;
                    let history = client.history(PROBE_PERIOD)?;
                    Ok((!history.is_empty()).then_some(client))
                })
                .await;

                let reason = match probe {
                    Ok(Ok(Some(client))) => {
                        debug!(%symbol, source = self.source.name(), "Resolved ticker");
                        return Ok(client);
                    }
                    Ok(Ok(None)) => "no price history".to_string(),
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => e.to_string(),
                };
                error!(%symbol, %reason, "Ticker '{symbol}' is invalid or has no data");
                Err(Unavailable::SymbolResolution(reason))
            })
            .await
    }

    /// Resolve `symbol` and run `fetch` against its client on a blocking
    /// worker. Errors and panics inside `fetch` become
    /// [`Unavailable::RemoteFetch`].
    pub async fn lookup<T, F>(&self, symbol: &Symbol, fetch: F) -> Result<T, Unavailable>
    where
        F: FnOnce(&dyn SymbolClient) -> SourceResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.resolve(symbol).await?;
        match tokio::task::spawn_blocking(move || fetch(client.as_ref())).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(%symbol, error = %e, "Market data fetch failed");
                Err(Unavailable::RemoteFetch(e.to_string()))
            }
            Err(e) => {
                warn!(%symbol, error = %e, "Market data fetch aborted");
                Err(Unavailable::RemoteFetch(e.to_string()))
            }
        }
    }

    async fn report<T, F, R>(&self, raw: &str, title: impl FnOnce(&str) -> String, fetch: F, render: R) -> String
    where
        F: FnOnce(&dyn SymbolClient) -> SourceResult<T> + Send + 'static,
        T: Send + 'static,
        R: FnOnce(T, &str) -> String,
    {
        let symbol = Symbol::new(raw);
        let title = match &symbol {
            Ok(symbol) => title(symbol.as_str()),
            Err(_) => title(raw.trim()),
        };

        let symbol = match symbol {
            Ok(symbol) => symbol,
            Err(e) => {
                error!(ticker = raw, error = %e, "Ticker '{}' is invalid or has no data", raw.trim());
                return unavailable(&title);
            }
        };

        match self.lookup(&symbol, fetch).await {
            Ok(data) => render(data, &title),
            Err(reason) => {
                debug!(%symbol, %reason, title = %title, "Report unavailable");
                unavailable(&title)
            }
        }
    }

    /// Company overview: name, sector, market cap, P/E and dividend yield
    pub async fn get_info(&self, symbol: &str) -> String {
        self.report(
            symbol,
            |s| format!("Core Information for {s}"),
            |client| client.info(),
            |info, title| {
                if info.is_empty() {
                    return unavailable(title);
                }
                format_block(Some(&ReportValue::Mapping(overview(&info))), title)
            },
        )
        .await
    }

    /// Headline of the most recent news item
    pub async fn get_news(&self, symbol: &str) -> String {
        self.report(
            symbol,
            |s| format!("Latest News for {s}"),
            |client| client.news(),
            |news, title| match news.into_iter().next() {
                Some(item) => {
                    let headline = item.title.unwrap_or_else(|| NO_NEWS_TITLE.to_string());
                    format_block(Some(&ReportValue::Text(headline)), title)
                }
                None => unavailable(title),
            },
        )
        .await
    }

    pub async fn get_financials(&self, symbol: &str, quarterly: bool) -> String {
        let frequency = Frequency::from_quarterly(quarterly);
        self.report(
            symbol,
            |s| format!("{} Income Statement for {s}", frequency.label()),
            move |client| client.financials(frequency),
            table_block,
        )
        .await
    }

    pub async fn get_balance_sheet(&self, symbol: &str, quarterly: bool) -> String {
        let frequency = Frequency::from_quarterly(quarterly);
        self.report(
            symbol,
            |s| format!("{} Balance Sheet for {s}", frequency.label()),
            move |client| client.balance_sheet(frequency),
            table_block,
        )
        .await
    }

    pub async fn get_cash_flow(&self, symbol: &str, quarterly: bool) -> String {
        let frequency = Frequency::from_quarterly(quarterly);
        self.report(
            symbol,
            |s| format!("{} Cash Flow for {s}", frequency.label()),
            move |client| client.cash_flow(frequency),
            table_block,
        )
        .await
    }

    /// Last five daily bars of the lookback `period` (default `1y`)
    pub async fn get_history(&self, symbol: &str, period: Option<&str>) -> String {
        let period = period.unwrap_or(self.default_period.as_str()).to_string();
        let lookback = period.clone();
        self.report(
            symbol,
            |s| format!("Price History for {s} (Last 5 days of {period})"),
            move |client| client.history(&lookback),
            |table, title| table_block(table.tail(5), title),
        )
        .await
    }

    pub async fn get_major_holders(&self, symbol: &str) -> String {
        self.report(
            symbol,
            |s| format!("Major Holders for {s}"),
            |client| client.major_holders(),
            table_block,
        )
        .await
    }

    /// Five largest institutional holders
    pub async fn get_institutional_holders(&self, symbol: &str) -> String {
        self.report(
            symbol,
            |s| format!("Top Institutional Holders for {s}"),
            |client| client.institutional_holders(),
            |table, title| table_block(table.head(5), title),
        )
        .await
    }

    /// Five most recent recommendation periods
    pub async fn get_recommendations(&self, symbol: &str) -> String {
        self.report(
            symbol,
            |s| format!("Analyst Recommendations for {s} (Last 5)"),
            |client| client.recommendations(),
            |table, title| table_block(table.tail(5), title),
        )
        .await
    }

    pub async fn get_sustainability(&self, symbol: &str) -> String {
        self.report(
            symbol,
            |s| format!("ESG Sustainability Ratings for {s}"),
            |client| client.sustainability(),
            table_block,
        )
        .await
    }

    /// First ten option expiration dates
    pub async fn get_option_expirations(&self, symbol: &str) -> String {
        self.report(
            symbol,
            |s| format!("Option Expiration Dates for {s} (First 10)"),
            |client| client.option_expirations(),
            |dates, title| {
                let dates = dates.into_iter().take(10).map(Value::String).collect();
                format_block(Some(&ReportValue::Sequence(dates)), title)
            },
        )
        .await
    }

    /// Sample of the option chain for the nearest expiration
    pub async fn get_option_chain(&self, symbol: &str) -> String {
        self.report(
            symbol,
            |s| format!("Option Chain Report for {s}"),
            |client| {
                let Some(nearest) = client.option_expirations()?.into_iter().next() else {
                    return Ok(None);
                };
                client.option_chain(&nearest).map(Some)
            },
            |chain, title| match chain {
                Some(chain) if !(chain.calls.is_empty() && chain.puts.is_empty()) => option_chain_block(&chain, title),
                _ => unavailable(title),
            },
        )
        .await
    }

    /// Every category for one symbol, fetched concurrently and joined with
    /// horizontal rules
    pub async fn full_report(&self, symbol: &str, quarterly: bool) -> String {
        let (info, news, income, balance, cash, history, major, institutional, recommendations, esg, expirations, chain) = futures::join!(
            self.get_info(symbol),
            self.get_news(symbol),
            self.get_financials(symbol, quarterly),
            self.get_balance_sheet(symbol, quarterly),
            self.get_cash_flow(symbol, quarterly),
            self.get_history(symbol, None),
            self.get_major_holders(symbol),
            self.get_institutional_holders(symbol),
            self.get_recommendations(symbol),
            self.get_sustainability(symbol),
            self.get_option_expirations(symbol),
            self.get_option_chain(symbol),
        );

        [info, news, income, balance, cash, history, major, institutional, recommendations, esg, expirations, chain]
            .join(&format!("\n\n{SECTION_RULE}\n\n"))
    }
}

fn table_block(table: Table, title: &str) -> String {
    format_block(Some(&ReportValue::Table(table)), title)
}

fn option_chain_block(chain: &OptionChain, title: &str) -> String {
    format!(
        "--- {title} ---\nExpiration Date: {}\n\n{}\n\n{}",
        chain.expiration_date,
        table_block(chain.calls.tail(3), "Sample Calls"),
        table_block(chain.puts.tail(3), "Sample Puts"),
    )
}

fn overview(info: &Map<String, Value>) -> BTreeMap<String, Value> {
    let field = |key: &str| info.get(key).cloned().unwrap_or(Value::Null);
    let market_cap = info.get("marketCap").map_or_else(|| "0".to_string(), group_thousands);
    let dividend_yield = info.get("dividendYield").and_then(Value::as_f64).unwrap_or(0.0);

    BTreeMap::from([
        ("Company Name".to_string(), field("longName")),
        ("Sector".to_string(), field("sector")),
        ("Market Cap".to_string(), Value::String(format!("${market_cap}"))),
        ("P/E Ratio".to_string(), field("trailingPE")),
        ("Dividend Yield".to_string(), Value::String(format!("{:.2}%", dividend_yield * 100.0))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Fixture, MemorySource, MockMarketDataSource, MockSymbolClient, NewsItem};
    use crate::error::SourceError;
    use crate::report::NOT_AVAILABLE;
    use serde_json::json;

    fn symbol(raw: &str) -> Symbol {
        Symbol::new(raw).unwrap()
    }

    fn sample_facade() -> (Arc<MemorySource>, FinanceFacade) {
        let source = Arc::new(MemorySource::sample(&"AAPL, MSFT".parse().unwrap()));
        let facade = FinanceFacade::new(source.clone());
        (source, facade)
    }

    fn facade_with(fixture: Fixture) -> FinanceFacade {
        FinanceFacade::new(Arc::new(MemorySource::new().with_fixture(symbol("AAPL"), fixture)))
    }

    fn tradable() -> Fixture {
        let sample = Fixture::sample(&symbol("AAPL"));
        Fixture {
            history: sample.history,
            ..Fixture::default()
        }
    }

    #[tokio::test]
    async fn test_info_overview() {
        let (_, facade) = sample_facade();
        let block = facade.get_info("aapl").await;

        assert!(block.starts_with("--- Core Information for AAPL ---\n"));
        assert!(block.contains("\"Company Name\": \"AAPL Corporation\""));
        assert!(block.contains("\"Sector\": \"Technology\""));
        assert!(block.contains("\"Dividend Yield\": \"0.52%\""));
        assert!(block.contains("\"Market Cap\": \"$"));
        assert!(block.contains(",000,000,000\""));
    }

    #[test]
    fn test_overview_defaults() {
        let mut info = Map::new();
        info.insert("longName".to_string(), json!("Example Corp"));
        let fields = overview(&info);

        assert_eq!(fields["Company Name"], json!("Example Corp"));
        assert_eq!(fields["Market Cap"], json!("$0"));
        assert_eq!(fields["Dividend Yield"], json!("0.00%"));
        assert_eq!(fields["P/E Ratio"], Value::Null);
        assert_eq!(fields["Sector"], Value::Null);
    }

    #[tokio::test]
    async fn test_empty_info_is_unavailable() {
        let facade = facade_with(tradable());
        assert_eq!(
            facade.get_info("AAPL").await,
            "--- Core Information for AAPL ---\nData not available."
        );
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_unavailable_everywhere() {
        let source = Arc::new(MemorySource::new());
        let facade = FinanceFacade::new(source.clone());

        let report = facade.full_report("ZZZZ", false).await;
        assert_eq!(report.matches(NOT_AVAILABLE).count(), 12);
        assert!(report.contains("--- Annual Income Statement for ZZZZ ---"));
        assert!(report.contains("--- Option Chain Report for ZZZZ ---"));
        assert!(facade.cached_symbols().await.is_empty());
        assert!(source.connect_count() >= 1);
    }

    #[tokio::test]
    async fn test_blank_symbol_never_reaches_source() {
        let source = Arc::new(MemorySource::new());
        let facade = FinanceFacade::new(source.clone());

        assert_eq!(facade.get_news("   ").await, "--- Latest News for  ---\nData not available.");
        assert_eq!(source.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_client_is_resolved_once() {
        let (source, facade) = sample_facade();

        facade.get_info("AAPL").await;
        facade.get_news("aapl").await;
        facade.get_history(" AAPL ", None).await;
        facade.get_info("MSFT").await;

        assert_eq!(source.connect_count(), 2);
        assert_eq!(facade.cached_symbols().await, vec![symbol("AAPL"), symbol("MSFT")]);
    }

    /// Holds `connect` for one symbol until the test releases it
    struct GatedSource {
        inner: MemorySource,
        gated: Symbol,
        entered: std::sync::atomic::AtomicBool,
        release: std::sync::Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl MarketDataSource for GatedSource {
        fn connect(&self, symbol: &Symbol) -> SourceResult<Arc<dyn SymbolClient>> {
            if *symbol == self.gated {
                self.entered.store(true, std::sync::atomic::Ordering::SeqCst);
                let _ = self.release.lock().unwrap().recv();
            }
            self.inner.connect(symbol)
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn test_slow_resolution_does_not_stall_other_symbols() {
        let (release, gate) = std::sync::mpsc::channel();
        let source = Arc::new(GatedSource {
            inner: MemorySource::sample(&"AAPL, SLOW".parse().unwrap()),
            gated: symbol("SLOW"),
            entered: std::sync::atomic::AtomicBool::new(false),
            release: std::sync::Mutex::new(gate),
        });
        let facade = Arc::new(FinanceFacade::new(source.clone()));
        assert!(!facade.get_info("AAPL").await.contains(NOT_AVAILABLE));

        let slow = tokio::spawn({
            let facade = Arc::clone(&facade);
            async move { facade.get_info("SLOW").await }
        });
        while !source.entered.load(std::sync::atomic::Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let cached = tokio::time::timeout(std::time::Duration::from_secs(2), facade.get_news("AAPL"))
            .await
            .expect("cached symbol waited on another symbol's probe");
        assert_eq!(cached, "--- Latest News for AAPL ---\nAAPL beats quarterly estimates");
        assert!(!slow.is_finished());

        release.send(()).unwrap();
        let block = slow.await.unwrap();
        assert!(block.starts_with("--- Core Information for SLOW ---\n"));
        assert!(!block.contains(NOT_AVAILABLE));
        assert_eq!(facade.cached_symbols().await, vec![symbol("AAPL"), symbol("SLOW")]);
    }

    #[tokio::test]
    async fn test_full_report_probes_once() {
        let (source, facade) = sample_facade();
        let report = facade.full_report("AAPL", true).await;

        assert_eq!(source.connect_count(), 1);
        assert_eq!(report.matches(SECTION_RULE).count(), 11);
        assert!(report.contains("--- Quarterly Balance Sheet for AAPL ---"));
        assert!(!report.contains(NOT_AVAILABLE));
    }

    #[tokio::test]
    async fn test_history_shows_last_five_rows() {
        let (_, facade) = sample_facade();
        let block = facade.get_history("AAPL", None).await;

        assert!(block.starts_with("--- Price History for AAPL (Last 5 days of 1y) ---\n"));
        assert!(block.contains("2024-06-12"));
        assert!(block.contains("2024-06-08"));
        assert!(!block.contains("2024-06-07"));

        let block = facade.get_history("AAPL", Some("5d")).await;
        assert!(block.contains("(Last 5 days of 5d)"));
    }

    #[tokio::test]
    async fn test_row_limits() {
        let (_, facade) = sample_facade();

        let holders = facade.get_institutional_holders("AAPL").await;
        assert!(holders.contains("Fund 5"));
        assert!(!holders.contains("Fund 6"));

        let recommendations = facade.get_recommendations("AAPL").await;
        assert!(recommendations.starts_with("--- Analyst Recommendations for AAPL (Last 5) ---"));
        assert!(recommendations.contains("-3m"));
        assert!(recommendations.contains("0m"));
    }

    #[tokio::test]
    async fn test_statement_titles() {
        let (_, facade) = sample_facade();

        let annual = facade.get_financials("AAPL", false).await;
        assert!(annual.starts_with("--- Annual Income Statement for AAPL ---"));
        assert!(annual.contains("2022-12-31"));

        let quarterly = facade.get_cash_flow("AAPL", true).await;
        assert!(quarterly.starts_with("--- Quarterly Cash Flow for AAPL ---"));
        assert!(quarterly.contains("Free Cash Flow"));
    }

    #[tokio::test]
    async fn test_option_chain_uses_nearest_expiration() {
        let (_, facade) = sample_facade();
        let block = facade.get_option_chain("AAPL").await;

        assert!(block.starts_with("--- Option Chain Report for AAPL ---\nExpiration Date: 2024-06-21\n\n--- Sample Calls ---\n"));
        assert!(block.contains("\n\n--- Sample Puts ---\n"));
        assert!(block.contains("AAPL240621C00003"));
        assert!(!block.contains("AAPL240621C00000"));

        let expirations = facade.get_option_expirations("AAPL").await;
        assert!(expirations.contains("\"2024-06-28\""));
    }

    #[tokio::test]
    async fn test_option_chain_without_contracts_is_unavailable() {
        let mut fixture = tradable();
        fixture.option_chains.push(OptionChain {
            expiration_date: "2024-06-21".to_string(),
            ..OptionChain::default()
        });
        let facade = facade_with(fixture);

        assert_eq!(
            facade.get_option_chain("AAPL").await,
            "--- Option Chain Report for AAPL ---\nData not available."
        );
        assert_eq!(
            facade.get_option_expirations("AAPL").await,
            "--- Option Expiration Dates for AAPL (First 10) ---\n[\n  \"2024-06-21\"\n]"
        );
    }

    #[tokio::test]
    async fn test_news_title_placeholder() {
        let mut fixture = tradable();
        fixture.news.push(NewsItem::default());
        let facade = facade_with(fixture);
        assert_eq!(
            facade.get_news("AAPL").await,
            format!("--- Latest News for AAPL ---\n{NO_NEWS_TITLE}")
        );

        let facade = facade_with(tradable());
        assert_eq!(facade.get_news("AAPL").await, "--- Latest News for AAPL ---\nData not available.");
    }

    fn mocked_source(client: MockSymbolClient) -> MockMarketDataSource {
        let client: Arc<dyn SymbolClient> = Arc::new(client);
        let mut source = MockMarketDataSource::new();
        source
            .expect_connect()
            .withf(|s| s.as_str() == "AAPL")
            .times(1)
            .returning(move |_| Ok(Arc::clone(&client)));
        source.expect_name().return_const("mock");
        source
    }

    fn probed_client() -> MockSymbolClient {
        let mut client = MockSymbolClient::new();
        client
            .expect_history()
            .withf(|period| period.to_string() == PROBE_PERIOD)
            .times(1)
            .returning(|_| Ok(Table::new("Date", ["Close"]).with_row("2024-06-03", vec![json!(190.1)])));
        client
    }

    #[tokio::test]
    async fn test_fetch_error_degrades() {
        let mut client = probed_client();
        client
            .expect_financials()
            .times(2)
            .returning(|_| Err(SourceError::Malformed("unexpected payload".to_string())));

        let facade = FinanceFacade::new(Arc::new(mocked_source(client)));
        for _ in 0..2 {
            assert_eq!(
                facade.get_financials("AAPL", true).await,
                "--- Quarterly Income Statement for AAPL ---\nData not available."
            );
        }
        assert_eq!(facade.cached_symbols().await, vec![symbol("AAPL")]);
    }

    #[tokio::test]
    async fn test_fetch_panic_is_caught() {
        let facade = FinanceFacade::new(Arc::new(mocked_source(probed_client())));

        let result = facade
            .lookup(&symbol("AAPL"), |_client| -> SourceResult<()> { panic!("source exploded") })
            .await;
        assert!(matches!(result, Err(Unavailable::RemoteFetch(_))));

        let result = facade.lookup(&symbol("AAPL"), |_client| Ok(42)).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_probe_error_is_symbol_resolution() {
        let mut client = MockSymbolClient::new();
        client
            .expect_history()
            .returning(|_| Err(SourceError::Yahoo("No data found, symbol may be delisted".to_string())));
        let facade = FinanceFacade::new(Arc::new(mocked_source(client)));

        let result = facade.resolve(&symbol("AAPL")).await;
        assert!(matches!(result, Err(Unavailable::SymbolResolution(reason)) if reason.contains("delisted")));
    }
}
