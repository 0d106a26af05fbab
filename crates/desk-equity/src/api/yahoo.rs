//! Yahoo Finance source
//!
//! Price history comes from the chart API through `yahoo_finance_api`. The
//! quote-summary, options and search endpoints need a session cookie and a
//! crumb, so they go through our own `reqwest` client.
//!
//! Client methods are blocking: they drive the async calls on the runtime
//! handle captured at construction and must be called from a blocking
//! worker, never from an async task.

use chrono::{DateTime, NaiveDate};
use desk_core::Symbol;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use super::{Frequency, MarketDataSource, NewsItem, OptionChain, SymbolClient};
use crate::error::{SourceError, SourceResult};
use crate::report::Table;

const QUERY_BASE: &str = "https://query2.finance.yahoo.com";
const CONSENT_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const INFO_MODULES: [&str; 5] = [
    "price",
    "summaryProfile",
    "summaryDetail",
    "defaultKeyStatistics",
    "financialData",
];

const CONTRACT_COLUMNS: [&str; 10] = [
    "lastTradeDate",
    "strike",
    "lastPrice",
    "bid",
    "ask",
    "change",
    "percentChange",
    "volume",
    "openInterest",
    "impliedVolatility",
];

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Settings for [`YahooSource`]
#[derive(Debug, Clone)]
pub struct YahooConfig {
    /// Upper bound on HTTP requests per second across all clients
    pub requests_per_second: NonZeroU32,
    pub timeout: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            requests_per_second: NonZeroU32::new(4).unwrap_or(NonZeroU32::MIN),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Market data source backed by Yahoo Finance
pub struct YahooSource {
    session: Arc<Session>,
}

impl YahooSource {
    /// Create a source bound to the current Tokio runtime
    ///
    /// # Errors
    ///
    /// Fails outside a Tokio runtime or when the HTTP clients cannot be
    /// built.
    pub fn new(config: &YahooConfig) -> SourceResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| SourceError::Config(format!("Yahoo source needs a Tokio runtime: {e}")))?;

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        let chart = yahoo::YahooConnector::new().map_err(|e| SourceError::Yahoo(e.to_string()))?;

        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(config.requests_per_second)));

        Ok(Self {
            session: Arc::new(Session {
                http,
                chart,
                crumb: Mutex::new(None),
                limiter,
                runtime,
            }),
        })
    }
}

impl MarketDataSource for YahooSource {
    fn connect(&self, symbol: &Symbol) -> SourceResult<Arc<dyn SymbolClient>> {
        Ok(Arc::new(YahooClient {
            session: Arc::clone(&self.session),
            symbol: symbol.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

/// State shared by every client of one source
struct Session {
    http: reqwest::Client,
    chart: yahoo::YahooConnector,
    crumb: Mutex<Option<String>>,
    limiter: SharedRateLimiter,
    runtime: Handle,
}

impl Session {
    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    async fn crumb(&self) -> SourceResult<String> {
        let mut slot = self.crumb.lock().await;
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }

        // Sets the consent cookie; the response itself is usually a 404.
        self.limiter.until_ready().await;
        if let Err(e) = self.http.get(CONSENT_URL).send().await {
            debug!(error = %e, "Yahoo consent request failed");
        }

        self.limiter.until_ready().await;
        let crumb = self
            .http
            .get(format!("{QUERY_BASE}/v1/test/getcrumb"))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let crumb = crumb.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(SourceError::Malformed("Yahoo returned no session crumb".to_string()));
        }

        debug!("Obtained Yahoo session crumb");
        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> SourceResult<Value> {
        let crumb = self.crumb().await?;
        self.limiter.until_ready().await;

        let response = self
            .http
            .get(url)
            .query(query)
            .query(&[("crumb", crumb)])
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Yahoo rejected the session crumb; it will be refreshed");
            self.crumb.lock().await.take();
        }

        Ok(response.error_for_status()?.json().await?)
    }

    async fn quote_summary(&self, symbol: &Symbol, modules: &[&str]) -> SourceResult<Map<String, Value>> {
        let url = format!("{QUERY_BASE}/v10/finance/quoteSummary/{symbol}");
        let body = self.get_json(&url, &[("modules", modules.join(","))]).await?;
        first_result(&body, "quoteSummary")
    }

    async fn summary_module(&self, symbol: &Symbol, module: &str) -> SourceResult<Value> {
        let mut result = self.quote_summary(symbol, &[module]).await?;
        Ok(result.remove(module).unwrap_or(Value::Null))
    }

    async fn options(&self, symbol: &Symbol, date: Option<i64>) -> SourceResult<Map<String, Value>> {
        let url = format!("{QUERY_BASE}/v7/finance/options/{symbol}");
        let query: Vec<(&str, String)> = date.map(|d| ("date", d.to_string())).into_iter().collect();
        let body = self.get_json(&url, &query).await?;
        first_result(&body, "optionChain")
    }

    async fn history(&self, symbol: &Symbol, period: &str) -> SourceResult<Table> {
        self.limiter.until_ready().await;
        let response = self
            .chart
            .get_quote_range(symbol.as_str(), "1d", period)
            .await
            .map_err(|e| SourceError::Yahoo(e.to_string()))?;
        let quotes = response.quotes().map_err(|e| SourceError::Yahoo(e.to_string()))?;

        let mut table = Table::new("Date", ["Open", "High", "Low", "Close", "Adj Close", "Volume"]);
        for q in quotes {
            let label = i64::try_from(q.timestamp)
                .ok()
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .map_or_else(|| q.timestamp.to_string(), |dt| dt.format("%Y-%m-%d").to_string());
            table.push_row(
                label,
                vec![
                    q.open.into(),
                    q.high.into(),
                    q.low.into(),
                    q.close.into(),
                    q.adjclose.into(),
                    q.volume.into(),
                ],
            );
        }
        Ok(table)
    }

    async fn news(&self, symbol: &Symbol) -> SourceResult<Vec<NewsItem>> {
        let url = format!("{QUERY_BASE}/v1/finance/search");
        let query = [
            ("q", symbol.to_string()),
            ("quotesCount", "0".to_string()),
            ("newsCount", "10".to_string()),
        ];
        let body = self.get_json(&url, &query).await?;
        Ok(parse_news(&body))
    }
}

/// Client for one ticker
struct YahooClient {
    session: Arc<Session>,
    symbol: Symbol,
}

impl YahooClient {
    fn statement(&self, statement: Statement, frequency: Frequency) -> SourceResult<Table> {
        let module = statement.module(frequency);
        let value = self.session.block_on(self.session.summary_module(&self.symbol, module))?;
        let entries = value
            .get(statement.list_key())
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(statement_table(entries))
    }

    fn module(&self, module: &str) -> SourceResult<Value> {
        self.session.block_on(self.session.summary_module(&self.symbol, module))
    }
}

impl SymbolClient for YahooClient {
    fn history(&self, period: &str) -> SourceResult<Table> {
        self.session.block_on(self.session.history(&self.symbol, period))
    }

    fn info(&self) -> SourceResult<Map<String, Value>> {
        let modules = self
            .session
            .block_on(self.session.quote_summary(&self.symbol, &INFO_MODULES))?;
        Ok(flatten_modules(&modules))
    }

    fn news(&self) -> SourceResult<Vec<NewsItem>> {
        self.session.block_on(self.session.news(&self.symbol))
    }

    fn financials(&self, frequency: Frequency) -> SourceResult<Table> {
        self.statement(Statement::Income, frequency)
    }

    fn balance_sheet(&self, frequency: Frequency) -> SourceResult<Table> {
        self.statement(Statement::Balance, frequency)
    }

    fn cash_flow(&self, frequency: Frequency) -> SourceResult<Table> {
        self.statement(Statement::CashFlow, frequency)
    }

    fn major_holders(&self) -> SourceResult<Table> {
        Ok(key_value_table("Breakdown", &self.module("majorHoldersBreakdown")?))
    }

    fn institutional_holders(&self) -> SourceResult<Table> {
        Ok(holders_table(&self.module("institutionOwnership")?))
    }

    fn recommendations(&self) -> SourceResult<Table> {
        Ok(recommendations_table(&self.module("recommendationTrend")?))
    }

    fn sustainability(&self) -> SourceResult<Table> {
        Ok(key_value_table("esgScores", &self.module("esgScores")?))
    }

    fn option_expirations(&self) -> SourceResult<Vec<String>> {
        let result = self.session.block_on(self.session.options(&self.symbol, None))?;
        Ok(result
            .get("expirationDates")
            .and_then(Value::as_array)
            .map(|dates| dates.iter().filter_map(Value::as_i64).filter_map(date_label).collect())
            .unwrap_or_default())
    }

    fn option_chain(&self, expiration: &str) -> SourceResult<OptionChain> {
        let date = NaiveDate::parse_from_str(expiration, "%Y-%m-%d")
            .map_err(|e| SourceError::Malformed(format!("expiration '{expiration}': {e}")))?;
        let timestamp = date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();

        let result = self
            .session
            .block_on(self.session.options(&self.symbol, Some(timestamp)))?;
        let chain = result
            .get("options")
            .and_then(Value::as_array)
            .and_then(|options| options.first())
            .cloned()
            .unwrap_or(Value::Null);

        Ok(OptionChain {
            expiration_date: expiration.to_string(),
            calls: contracts_table(&chain["calls"]),
            puts: contracts_table(&chain["puts"]),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Statement {
    Income,
    Balance,
    CashFlow,
}

impl Statement {
    fn module(self, frequency: Frequency) -> &'static str {
        match (self, frequency) {
            (Self::Income, Frequency::Annual) => "incomeStatementHistory",
            (Self::Income, Frequency::Quarterly) => "incomeStatementHistoryQuarterly",
            (Self::Balance, Frequency::Annual) => "balanceSheetHistory",
            (Self::Balance, Frequency::Quarterly) => "balanceSheetHistoryQuarterly",
            (Self::CashFlow, Frequency::Annual) => "cashflowStatementHistory",
            (Self::CashFlow, Frequency::Quarterly) => "cashflowStatementHistoryQuarterly",
        }
    }

    fn list_key(self) -> &'static str {
        match self {
            Self::Income => "incomeStatementHistory",
            Self::Balance => "balanceSheetStatements",
            Self::CashFlow => "cashflowStatements",
        }
    }
}

fn first_result(body: &Value, root: &str) -> SourceResult<Map<String, Value>> {
    body.get(root)
        .and_then(|r| r.get("result"))
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| {
            let detail = body
                .pointer(&format!("/{root}/error/description"))
                .and_then(Value::as_str)
                .unwrap_or("missing result");
            SourceError::Malformed(format!("{root}: {detail}"))
        })
}

/// Unwrap Yahoo's `{"raw": .., "fmt": ..}` number envelopes
fn plain(value: &Value) -> Value {
    match value {
        Value::Object(map) if map.contains_key("raw") => map.get("raw").cloned().unwrap_or(Value::Null),
        Value::Object(map) if map.is_empty() => Value::Null,
        other => other.clone(),
    }
}

fn is_scalar(value: &Value) -> bool {
    !value.is_object() && !value.is_array()
}

fn date_label(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Merge quote-summary modules into one flat field map; the first module
/// that carries a field wins.
fn flatten_modules(modules: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for module in INFO_MODULES {
        let Some(Value::Object(fields)) = modules.get(module) else {
            continue;
        };
        for (key, value) in fields {
            let value = plain(value);
            if key != "maxAge" && is_scalar(&value) && !flat.contains_key(key) {
                flat.insert(key.clone(), value);
            }
        }
    }
    flat
}

/// One column per reporting period, one row per line item
fn statement_table(entries: &[Value]) -> Table {
    let periods: Vec<String> = entries
        .iter()
        .map(|entry| {
            entry["endDate"]
                .get("fmt")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| plain(&entry["endDate"]).as_i64().and_then(date_label))
                .unwrap_or_default()
        })
        .collect();

    let mut items: Vec<&str> = Vec::new();
    for entry in entries {
        if let Some(fields) = entry.as_object() {
            for key in fields.keys() {
                if key != "endDate" && key != "maxAge" && !items.contains(&key.as_str()) {
                    items.push(key);
                }
            }
        }
    }

    let mut table = Table::new("Breakdown", periods);
    for item in items {
        let values = entries.iter().map(|entry| plain(&entry[item])).collect();
        table.push_row(item, values);
    }
    table
}

fn key_value_table(index: &str, module: &Value) -> Table {
    let mut table = Table::new(index, ["Value"]);
    if let Some(fields) = module.as_object() {
        for (key, value) in fields {
            let value = plain(value);
            if key != "maxAge" && is_scalar(&value) {
                table.push_row(key.as_str(), vec![value]);
            }
        }
    }
    table
}

fn holders_table(module: &Value) -> Table {
    let mut table = Table::new("Holder", ["Date Reported", "Shares", "Value", "% Out", "% Change"]);
    for holder in module["ownershipList"].as_array().into_iter().flatten() {
        let name = holder["organization"].as_str().unwrap_or_default().to_string();
        let reported = holder["reportDate"]
            .get("fmt")
            .cloned()
            .unwrap_or_else(|| plain(&holder["reportDate"]));
        table.push_row(
            name,
            vec![
                reported,
                plain(&holder["position"]),
                plain(&holder["value"]),
                plain(&holder["pctHeld"]),
                plain(&holder["pctChange"]),
            ],
        );
    }
    table
}

/// Recommendation trend, oldest period first (Yahoo lists newest first)
fn recommendations_table(module: &Value) -> Table {
    const COUNTS: [&str; 5] = ["strongBuy", "buy", "hold", "sell", "strongSell"];
    let mut table = Table::new("period", COUNTS);
    for trend in module["trend"].as_array().into_iter().flatten().rev() {
        let period = trend["period"].as_str().unwrap_or_default().to_string();
        table.push_row(period, COUNTS.iter().map(|key| plain(&trend[*key])).collect());
    }
    table
}

fn contracts_table(contracts: &Value) -> Table {
    let mut table = Table::new("contractSymbol", CONTRACT_COLUMNS);
    for contract in contracts.as_array().into_iter().flatten() {
        let label = contract["contractSymbol"].as_str().unwrap_or_default().to_string();
        let values = CONTRACT_COLUMNS
            .iter()
            .map(|column| {
                let value = plain(&contract[*column]);
                match (*column, value.as_i64()) {
                    ("lastTradeDate", Some(ts)) => date_label(ts).map_or(value, Value::String),
                    _ => value,
                }
            })
            .collect();
        table.push_row(label, values);
    }
    table
}

fn parse_news(body: &Value) -> Vec<NewsItem> {
    body["news"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|item| NewsItem {
            title: item["title"].as_str().map(str::to_string),
            publisher: item["publisher"].as_str().map(str::to_string),
            link: item["link"].as_str().map(str::to_string),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_unwraps_envelopes() {
        assert_eq!(plain(&json!({"raw": 1.5, "fmt": "1.50"})), json!(1.5));
        assert_eq!(plain(&json!({})), Value::Null);
        assert_eq!(plain(&json!("Technology")), json!("Technology"));
    }

    #[test]
    fn test_first_result_reports_error_description() {
        let body = json!({"quoteSummary": {"result": null, "error": {"description": "Quote not found"}}});
        let err = first_result(&body, "quoteSummary").unwrap_err();
        assert!(err.to_string().contains("Quote not found"));

        let body = json!({"quoteSummary": {"result": [{"price": {}}], "error": null}});
        assert!(first_result(&body, "quoteSummary").unwrap().contains_key("price"));
    }

    #[test]
    fn test_flatten_modules_first_wins() {
        let modules = json!({
            "price": {"longName": "Apple Inc.", "marketCap": {"raw": 3_000_000, "fmt": "3M"}, "maxAge": 1},
            "summaryProfile": {"sector": "Technology", "companyOfficers": []},
            "summaryDetail": {"marketCap": {"raw": 1}, "trailingPE": {"raw": 31.2}}
        });
        let flat = flatten_modules(modules.as_object().unwrap());
        assert_eq!(flat["longName"], "Apple Inc.");
        assert_eq!(flat["marketCap"], json!(3_000_000));
        assert_eq!(flat["trailingPE"], json!(31.2));
        assert_eq!(flat["sector"], "Technology");
        assert!(!flat.contains_key("maxAge"));
        assert!(!flat.contains_key("companyOfficers"));
    }

    #[test]
    fn test_statement_table() {
        let entries = json!([
            {"endDate": {"raw": 1_727_481_600, "fmt": "2024-09-28"}, "totalRevenue": {"raw": 391_035}, "maxAge": 1},
            {"endDate": {"raw": 1_695_945_600, "fmt": "2023-09-30"}, "totalRevenue": {"raw": 383_285}, "netIncome": {"raw": 96_995}}
        ]);
        let table = statement_table(entries.as_array().unwrap());
        assert_eq!(table.columns(), ["2024-09-28", "2023-09-30"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, "2023-09-30"), Some(&json!(383_285)));
        assert_eq!(table.rows()[1].label, "netIncome");
        assert_eq!(table.cell(1, "2024-09-28"), Some(&Value::Null));
    }

    #[test]
    fn test_recommendations_oldest_first() {
        let module = json!({"trend": [
            {"period": "0m", "strongBuy": 5, "buy": 10, "hold": 8, "sell": 1, "strongSell": 0},
            {"period": "-1m", "strongBuy": 4, "buy": 11, "hold": 8, "sell": 1, "strongSell": 0}
        ]});
        let table = recommendations_table(&module);
        assert_eq!(table.rows()[0].label, "-1m");
        assert_eq!(table.tail(1).rows()[0].label, "0m");
        assert_eq!(table.cell(1, "strongBuy"), Some(&json!(5)));
    }

    #[test]
    fn test_contracts_and_holders() {
        let calls = json!([{"contractSymbol": "AAPL250117C00150000", "strike": {"raw": 150.0}, "lastTradeDate": 1_736_899_200}]);
        let table = contracts_table(&calls);
        assert_eq!(table.rows()[0].label, "AAPL250117C00150000");
        assert_eq!(table.cell(0, "strike"), Some(&json!(150.0)));
        assert_eq!(table.cell(0, "lastTradeDate"), Some(&json!("2025-01-15")));
        assert!(contracts_table(&Value::Null).is_empty());

        let holders = json!({"ownershipList": [
            {"organization": "Vanguard Group Inc", "reportDate": {"raw": 1, "fmt": "2024-06-30"}, "position": {"raw": 1_300_000}, "pctHeld": {"raw": 0.0869}}
        ]});
        let table = holders_table(&holders);
        assert_eq!(table.rows()[0].label, "Vanguard Group Inc");
        assert_eq!(table.cell(0, "Date Reported"), Some(&json!("2024-06-30")));
        assert_eq!(table.cell(0, "% Out"), Some(&json!(0.0869)));
    }

    #[test]
    fn test_parse_news() {
        let body = json!({"news": [{"title": "Apple ships", "publisher": "Wire"}, {"publisher": "Other"}]});
        let news = parse_news(&body);
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].title.as_deref(), Some("Apple ships"));
        assert_eq!(news[1].title, None);
    }

    #[test]
    fn test_new_requires_runtime() {
        assert!(matches!(YahooSource::new(&YahooConfig::default()), Err(SourceError::Config(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore] // Requires network access
    async fn test_live_history_and_info() {
        let source = YahooSource::new(&YahooConfig::default()).unwrap();
        let client = source.connect(&Symbol::new("AAPL").unwrap()).unwrap();

        let (history, info) = tokio::task::spawn_blocking(move || (client.history("5d"), client.info()))
            .await
            .unwrap();
        assert!(!history.unwrap().is_empty());
        assert!(info.unwrap().contains_key("longName"));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore] // Requires network access
    async fn test_live_option_chain() {
        let source = YahooSource::new(&YahooConfig::default()).unwrap();
        let client = source.connect(&Symbol::new("AAPL").unwrap()).unwrap();

        let chain = tokio::task::spawn_blocking(move || {
            let expirations = client.option_expirations()?;
            let first = expirations
                .first()
                .ok_or_else(|| SourceError::NoData("no expirations".to_string()))?;
            client.option_chain(first)
        })
        .await
        .unwrap()
        .unwrap();
        assert!(!chain.calls.is_empty() || !chain.puts.is_empty());
    }
}
