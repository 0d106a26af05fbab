//! Facade categories exposed as model-callable tools

use async_trait::async_trait;
use desk_core::Result as CoreResult;
use desk_tools::{Tool, ToolRegistry};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::facade::FinanceFacade;

/// One facade report category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Info,
    News,
    Financials,
    BalanceSheet,
    CashFlow,
    History,
    MajorHolders,
    InstitutionalHolders,
    Recommendations,
    Sustainability,
    OptionExpirations,
    OptionChain,
}

impl ReportKind {
    /// Every category, in the order tools are offered to the model
    pub const ALL: [ReportKind; 12] = [
        Self::Info,
        Self::News,
        Self::Financials,
        Self::BalanceSheet,
        Self::CashFlow,
        Self::History,
        Self::MajorHolders,
        Self::InstitutionalHolders,
        Self::Recommendations,
        Self::Sustainability,
        Self::OptionExpirations,
        Self::OptionChain,
    ];

    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Info => "get_info",
            Self::News => "get_news",
            Self::Financials => "get_financials",
            Self::BalanceSheet => "get_balance_sheet",
            Self::CashFlow => "get_cash_flow",
            Self::History => "get_history",
            Self::MajorHolders => "get_major_holders",
            Self::InstitutionalHolders => "get_institutional_holders",
            Self::Recommendations => "get_recommendations",
            Self::Sustainability => "get_sustainability",
            Self::OptionExpirations => "get_option_expirations",
            Self::OptionChain => "get_option_chain",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Info => "Company overview for a ticker: name, sector, market cap, P/E ratio and dividend yield.",
            Self::News => "Headline of the most recent news item about a ticker.",
            Self::Financials => "Income statement for a ticker, annual by default or quarterly.",
            Self::BalanceSheet => "Balance sheet for a ticker, annual by default or quarterly.",
            Self::CashFlow => "Cash flow statement for a ticker, annual by default or quarterly.",
            Self::History => "Last five daily price bars (open, high, low, close, volume) within a lookback period.",
            Self::MajorHolders => "Ownership breakdown between insiders and institutions.",
            Self::InstitutionalHolders => "The five largest institutional holders of a ticker.",
            Self::Recommendations => "Analyst buy/hold/sell recommendation counts for the five most recent periods.",
            Self::Sustainability => "ESG (environmental, social, governance) risk scores for a ticker.",
            Self::OptionExpirations => "The first ten option expiration dates for a ticker.",
            Self::OptionChain => "Sample calls and puts for the nearest option expiration of a ticker.",
        }
    }

    fn takes_frequency(self) -> bool {
        matches!(self, Self::Financials | Self::BalanceSheet | Self::CashFlow)
    }
}

#[derive(Debug, Deserialize)]
struct ReportParams {
    #[serde(alias = "ticker")]
    symbol: String,
    #[serde(default)]
    quarterly: bool,
    #[serde(default)]
    period: Option<String>,
}

/// Tool serving one report category from a shared facade
pub struct ReportTool {
    facade: Arc<FinanceFacade>,
    kind: ReportKind,
}

impl ReportTool {
    pub fn new(facade: Arc<FinanceFacade>, kind: ReportKind) -> Self {
        Self { facade, kind }
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    async fn render(&self, params: ReportParams) -> String {
        let facade = &self.facade;
        let symbol = params.symbol.as_str();
        match self.kind {
            ReportKind::Info => facade.get_info(symbol).await,
            ReportKind::News => facade.get_news(symbol).await,
            ReportKind::Financials => facade.get_financials(symbol, params.quarterly).await,
            ReportKind::BalanceSheet => facade.get_balance_sheet(symbol, params.quarterly).await,
            ReportKind::CashFlow => facade.get_cash_flow(symbol, params.quarterly).await,
            ReportKind::History => facade.get_history(symbol, params.period.as_deref()).await,
            ReportKind::MajorHolders => facade.get_major_holders(symbol).await,
            ReportKind::InstitutionalHolders => facade.get_institutional_holders(symbol).await,
            ReportKind::Recommendations => facade.get_recommendations(symbol).await,
            ReportKind::Sustainability => facade.get_sustainability(symbol).await,
            ReportKind::OptionExpirations => facade.get_option_expirations(symbol).await,
            ReportKind::OptionChain => facade.get_option_chain(symbol).await,
        }
    }
}

#[async_trait]
impl Tool for ReportTool {
    async fn execute(&self, params: Value) -> CoreResult<Value> {
        let params: ReportParams = serde_json::from_value(params)
            .map_err(|e| desk_core::Error::ProcessingFailed(format!("Invalid parameters: {e}")))?;

        Ok(Value::String(self.render(params).await))
    }

    fn name(&self) -> &str {
        self.kind.tool_name()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn input_schema(&self) -> Value {
        let mut properties = json!({
            "symbol": {
                "type": "string",
                "description": "Stock ticker symbol (e.g., 'AAPL', 'MSFT')"
            }
        });

        if self.kind.takes_frequency() {
            properties["quarterly"] = json!({
                "type": "boolean",
                "description": "Quarterly statements instead of annual",
                "default": false
            });
        }

        if self.kind == ReportKind::History {
            properties["period"] = json!({
                "type": "string",
                "description": "Lookback period",
                "enum": ["1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max"],
                "default": self.facade.default_period()
            });
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": ["symbol"]
        })
    }
}

/// The twelve report tools over one facade
///
/// # Errors
///
/// Fails only if two categories share a tool name.
pub fn capability_set(facade: &Arc<FinanceFacade>) -> CoreResult<ToolRegistry> {
    ReportKind::ALL.iter().try_fold(ToolRegistry::new(), |registry, kind| {
        registry.with_tool(Arc::new(ReportTool::new(Arc::clone(facade), *kind)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemorySource;

    fn facade() -> Arc<FinanceFacade> {
        Arc::new(FinanceFacade::new(Arc::new(MemorySource::sample(
            &"AAPL".parse().unwrap(),
        ))))
    }

    #[test]
    fn test_capability_set_order() {
        let registry = capability_set(&facade()).unwrap();
        assert_eq!(registry.len(), 12);
        assert_eq!(registry.names().first(), Some(&"get_info"));
        assert_eq!(registry.names().last(), Some(&"get_option_chain"));
    }

    #[test]
    fn test_schemas() {
        let facade = facade();
        let income = ReportTool::new(Arc::clone(&facade), ReportKind::Financials).input_schema();
        assert_eq!(income["required"], json!(["symbol"]));
        assert_eq!(income["properties"]["quarterly"]["type"], "boolean");
        assert!(income["properties"]["period"].is_null());

        let history = ReportTool::new(Arc::clone(&facade), ReportKind::History).input_schema();
        assert_eq!(history["properties"]["period"]["default"], "1y");

        let news = ReportTool::new(facade, ReportKind::News).input_schema();
        assert!(news["properties"]["quarterly"].is_null());
    }

    #[tokio::test]
    async fn test_execute_returns_report_block() {
        let registry = capability_set(&facade()).unwrap();

        let result = registry
            .invoke("get_balance_sheet", json!({"symbol": "aapl", "quarterly": true}))
            .await
            .unwrap();
        let text = result.as_str().unwrap();
        assert!(text.starts_with("--- Quarterly Balance Sheet for AAPL ---"));

        let result = registry
            .invoke("get_history", json!({"ticker": "AAPL", "period": "5d"}))
            .await
            .unwrap();
        assert!(result.as_str().unwrap().contains("(Last 5 days of 5d)"));
    }

    #[tokio::test]
    async fn test_execute_rejects_missing_symbol() {
        let tool = ReportTool::new(facade(), ReportKind::Info);
        let err = tool.execute(json!({"quarterly": true})).await.unwrap_err();
        assert!(err.to_string().contains("Invalid parameters"));
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_not_an_error() {
        let tool = ReportTool::new(facade(), ReportKind::Recommendations);
        let result = tool.execute(json!({"symbol": "NOPE"})).await.unwrap();
        assert_eq!(
            result,
            json!("--- Analyst Recommendations for NOPE (Last 5) ---\nData not available.")
        );
    }
}
