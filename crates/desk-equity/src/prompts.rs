//! Stage instructions
//!
//! Each desk role has a minijinja template rendered with the symbol set and
//! the section headers the role is expected to produce. Headers use `###`
//! so the aggregator can split the stage output into sections.

use desk_core::SymbolSet;
use minijinja::{Environment, context};

use crate::error::Result;

const STOCK_ANALYST: &str = r#"You are the Stock Analyst of an equity research desk covering: {{ symbols }}.

Build the factual base the rest of the desk will rely on. For every company, use your tools to collect the company overview, recent price history and the latest headline, the income statement, balance sheet and cash flow (prefer quarterly figures), analyst recommendations, major and institutional holders, ESG ratings, and the nearest option expirations and chain.

Interpret what you collect: price momentum, profitability and balance-sheet strength, how analysts and large holders are positioned, and what the option market implies about expected volatility. When a tool answers "Data not available." say so plainly and carry on with the rest.

Write Markdown. Every section starts with a level-three header on its own line and the report starts with the first header. Use exactly these sections:
{% for section in sections %}
### {{ section }}
{%- endfor %}"#;

const RESEARCH_ANALYST: &str = r#"You are the Research Analyst of an equity research desk covering: {{ symbols }}.

You receive the Stock Analyst's report. Compare the companies against each other on valuation, growth, profitability, financial strength, market sentiment and ESG risk. Use your tools to verify or fill in any figure the report is missing. Rank the companies from most to least attractive and justify every position with numbers.

Write Markdown. Every section starts with a level-three header on its own line and the report starts with the first header. Use exactly these sections:
{% for section in sections %}
### {{ section }}
{%- endfor %}"#;

const INVESTMENT_LEAD: &str = r#"You are the Investment Lead of an equity research desk covering: {{ symbols }}.

You receive the Stock Analyst's data report and the Research Analyst's ranking. Turn them into a portfolio recommendation: a target allocation across the companies in percent, an entry approach, the main risks with how to hedge or limit them, and the signals that would change your view. Consult your tools only to confirm figures you rely on.

Write Markdown. Every section starts with a level-three header on its own line and the report starts with the first header. Use exactly these sections:
{% for section in sections %}
### {{ section }}
{%- endfor %}"#;

const RESEARCH_REQUEST: &str = "Company name: {{ symbols }}";

/// The three desk roles, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    StockAnalyst,
    ResearchAnalyst,
    InvestmentLead,
}

impl Role {
    pub const ALL: [Role; 3] = [Self::StockAnalyst, Self::ResearchAnalyst, Self::InvestmentLead];

    /// Stage name, also used as the document heading
    pub fn stage_name(self) -> &'static str {
        match self {
            Self::StockAnalyst => "Stock Analyst",
            Self::ResearchAnalyst => "Research Analyst",
            Self::InvestmentLead => "Investment Lead",
        }
    }

    /// Earlier roles whose reports this role reads
    pub fn upstream(self) -> &'static [Role] {
        match self {
            Self::StockAnalyst => &[],
            Self::ResearchAnalyst => &[Self::StockAnalyst],
            Self::InvestmentLead => &[Self::StockAnalyst, Self::ResearchAnalyst],
        }
    }

    fn template_name(self) -> &'static str {
        match self {
            Self::StockAnalyst => "stock_analyst",
            Self::ResearchAnalyst => "research_analyst",
            Self::InvestmentLead => "investment_lead",
        }
    }

    /// Section headers the role must produce
    pub fn sections(self) -> &'static [&'static str] {
        match self {
            Self::StockAnalyst => &[
                "Market Overview",
                "Price Performance",
                "Financial Health",
                "Analyst and Ownership Sentiment",
                "ESG and Options Signals",
            ],
            Self::ResearchAnalyst => &[
                "Comparative Valuation",
                "Growth and Profitability",
                "Risk Assessment",
                "Ranking",
            ],
            Self::InvestmentLead => &[
                "Portfolio Allocation",
                "Investment Rationale",
                "Risk Management",
                "Watchlist and Triggers",
            ],
        }
    }
}

/// Renders role instructions and the research request
pub struct StagePrompts {
    env: Environment<'static>,
}

impl StagePrompts {
    /// # Errors
    ///
    /// Fails if a built-in template does not parse.
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(Role::StockAnalyst.template_name(), STOCK_ANALYST)?;
        env.add_template(Role::ResearchAnalyst.template_name(), RESEARCH_ANALYST)?;
        env.add_template(Role::InvestmentLead.template_name(), INVESTMENT_LEAD)?;
        env.add_template("research_request", RESEARCH_REQUEST)?;
        Ok(Self { env })
    }

    /// Instruction for `role` over `symbols`
    pub fn instruction(&self, role: Role, symbols: &SymbolSet) -> Result<String> {
        let template = self.env.get_template(role.template_name())?;
        Ok(template.render(context! {
            symbols => symbols.to_string(),
            sections => role.sections(),
        })?)
    }

    /// Input handed to the first stage
    pub fn request(&self, symbols: &SymbolSet) -> Result<String> {
        let template = self.env.get_template("research_request")?;
        Ok(template.render(context! { symbols => symbols.to_string() })?)
    }
}
