//! Command-line interface for equity-desk

use anyhow::{Context as _, Result};
use clap::Parser;
use desk_core::SymbolSet;
use desk_equity::{
    DEFAULT_SYMBOLS, DeskConfig, FinanceFacade, MarketDataSource, MemorySource, ResearchDesk, SCENARIOS,
    YahooSource, scenario,
};
use desk_llm::providers::OpenAIProvider;
use desk_runtime::AgentExecutor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "equity-desk")]
#[command(about = "Research a set of stocks with a three-stage analyst desk", long_about = None)]
struct Args {
    /// Comma-separated ticker symbols
    #[arg(default_value = DEFAULT_SYMBOLS, conflicts_with = "scenario")]
    symbols: String,

    /// Research a named symbol set instead (see --list-scenarios)
    #[arg(short, long)]
    scenario: Option<String>,

    /// Where to write the Markdown document [default: result.md]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Serve market data from built-in sample fixtures instead of Yahoo Finance
    #[arg(long)]
    offline: bool,

    /// Print every data category for one ticker and exit, without calling a model
    #[arg(long, value_name = "SYMBOL")]
    report: Option<String>,

    /// List the named symbol sets and exit
    #[arg(long)]
    list_scenarios: bool,
}

impl Args {
    fn symbols(&self) -> Result<SymbolSet> {
        let raw = match (&self.report, &self.scenario) {
            (Some(ticker), _) => ticker.as_str(),
            (None, Some(name)) => scenario(name).with_context(|| format!("Unknown scenario '{name}'"))?,
            (None, None) => self.symbols.as_str(),
        };
        raw.parse().with_context(|| format!("Invalid symbol list '{raw}'"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();
    desk_utils::init_tracing();

    let args = Args::parse();

    if args.list_scenarios {
        for (name, symbols) in SCENARIOS {
            println!("{name:<16}{symbols}");
        }
        return Ok(());
    }

    let mut config = DeskConfig::from_env().context("Invalid desk configuration")?;
    if let Some(output) = &args.output {
        config.output_path.clone_from(output);
    }

    let symbols = args.symbols()?;
    let source: Arc<dyn MarketDataSource> = if args.offline {
        Arc::new(MemorySource::sample(&symbols))
    } else {
        Arc::new(YahooSource::new(&config.yahoo_config()).context("Failed to set up Yahoo Finance")?)
    };

    if let Some(ticker) = &args.report {
        let facade = FinanceFacade::new(source).with_default_period(config.history_period.clone());
        println!("{}", facade.full_report(ticker, true).await);
        return Ok(());
    }

    let provider = OpenAIProvider::from_env().context("LLM provider is not configured")?;
    let engine = AgentExecutor::new(Arc::new(provider), config.executor_config());
    let output = config.output_path.clone();

    info!(%symbols, output = %output.display(), offline = args.offline, "Starting equity-desk");

    let desk = ResearchDesk::new(source, Arc::new(engine), config)?;
    let document = desk
        .run_to_file(&symbols, &output)
        .await
        .context("Research run failed")?;

    println!("Wrote {} bytes of research to {}", document.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_symbols() {
        let args = Args::try_parse_from(["equity-desk"]).unwrap();
        assert_eq!(args.symbols().unwrap().to_string(), "AAPL, MSFT, GOOGL");
        assert!(!args.offline);
    }

    #[test]
    fn test_scenario_and_report() {
        let args = Args::try_parse_from(["equity-desk", "--scenario", "banking"]).unwrap();
        assert_eq!(args.symbols().unwrap().to_string(), "JPM, BAC, GS");

        let args = Args::try_parse_from(["equity-desk", "--report", "tsla", "--offline"]).unwrap();
        assert_eq!(args.symbols().unwrap().to_string(), "TSLA");

        let args = Args::try_parse_from(["equity-desk", "--scenario", "crypto"]).unwrap();
        assert!(args.symbols().is_err());
    }

    #[test]
    fn test_symbols_conflict_with_scenario() {
        assert!(Args::try_parse_from(["equity-desk", "NVDA", "--scenario", "energy"]).is_err());
    }

    #[test]
    fn test_output_flag() {
        let args = Args::try_parse_from(["equity-desk", "NVDA, AMD", "-o", "out/nv.md"]).unwrap();
        assert_eq!(args.output, Some(PathBuf::from("out/nv.md")));
        assert_eq!(args.symbols().unwrap().len(), 2);
    }
}
