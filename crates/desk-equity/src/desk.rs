//! The three-stage research desk

use desk_core::{Context, SymbolSet};
use desk_runtime::{ReasoningEngine, StageRunner};
use desk_workflow::{Pipeline, PipelineRun, write_markdown};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::MarketDataSource;
use crate::config::DeskConfig;
use crate::error::Result;
use crate::facade::FinanceFacade;
use crate::prompts::{Role, StagePrompts};
use crate::tools::capability_set;

/// Symbols researched when none are given
pub const DEFAULT_SYMBOLS: &str = "AAPL, MSFT, GOOGL";

/// Named symbol sets for quick runs
pub const SCENARIOS: [(&str, &str); 7] = [
    ("tech", "AAPL, MSFT, GOOGL"),
    ("semiconductors", "NVDA, AMD, INTC"),
    ("automotive", "TSLA, F, GM"),
    ("banking", "JPM, BAC, GS"),
    ("retail", "AMZN, WMT, TGT"),
    ("healthcare", "PFE, JNJ, MRNA"),
    ("energy", "XOM, CVX, BP"),
];

/// Symbols of a named scenario
pub fn scenario(name: &str) -> Option<&'static str> {
    SCENARIOS
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, symbols)| *symbols)
}

/// Stock Analyst -> Research Analyst -> Investment Lead over one data source
///
/// Each run gets its own [`FinanceFacade`], so the client cache lives exactly
/// as long as the run.
pub struct ResearchDesk {
    source: Arc<dyn MarketDataSource>,
    engine: Arc<dyn ReasoningEngine>,
    config: DeskConfig,
    prompts: StagePrompts,
}

impl ResearchDesk {
    /// # Errors
    ///
    /// Fails if the configuration does not validate.
    pub fn new(source: Arc<dyn MarketDataSource>, engine: Arc<dyn ReasoningEngine>, config: DeskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            engine,
            config,
            prompts: StagePrompts::new()?,
        })
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// The three stages for `symbols`, sharing one capability set over
    /// `facade`. Each stage reads the reports of its upstream roles.
    pub fn pipeline(&self, symbols: &SymbolSet, facade: &Arc<FinanceFacade>) -> Result<Pipeline> {
        let capabilities = Arc::new(capability_set(facade)?);

        let mut builder = Pipeline::builder();
        for role in Role::ALL {
            let runner = StageRunner::new(
                role.stage_name(),
                self.prompts.instruction(role, symbols)?,
                Arc::clone(&capabilities),
                Arc::clone(&self.engine),
            );
            let upstream: Vec<&str> = role.upstream().iter().map(|r| r.stage_name()).collect();
            builder = builder.stage_with_inputs(Arc::new(runner), &upstream);
        }
        Ok(builder.build()?)
    }

    /// Run the desk over `symbols`
    ///
    /// # Errors
    ///
    /// Any stage failure aborts the run with
    /// [`desk_core::Error::StageFailed`].
    pub async fn run(&self, symbols: &SymbolSet) -> Result<PipelineRun> {
        let facade = Arc::new(
            FinanceFacade::new(Arc::clone(&self.source)).with_default_period(self.config.history_period.clone()),
        );
        let pipeline = self.pipeline(symbols, &facade)?;

        let run_id = Uuid::new_v4().to_string();
        let context = Context::new().with_run_id(run_id.clone()).with_symbols(symbols);
        info!(
            %run_id,
            %symbols,
            source = facade.source_name(),
            model = %self.config.model,
            "Starting research run"
        );

        let run = pipeline.run(self.prompts.request(symbols)?, context).await?;

        info!(
            %run_id,
            resolved = facade.cached_symbols().await.len(),
            "Research run finished"
        );
        Ok(run)
    }

    /// Run the desk and write the Markdown document to `path`
    ///
    /// Nothing is written when a stage fails.
    pub async fn run_to_file(&self, symbols: &SymbolSet, path: impl AsRef<Path>) -> Result<String> {
        let run = self.run(symbols).await?;
        Ok(write_markdown(&run, path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemorySource;
    use crate::report::NOT_AVAILABLE;
    use crate::tools::ReportKind;
    use async_trait::async_trait;
    use desk_tools::ToolRegistry;
    use serde_json::json;
    use std::sync::Mutex;

    /// Calls every tool for every symbol and answers in sections, recording
    /// each input and tool result
    #[derive(Default)]
    struct ScriptedEngine {
        symbols: Vec<String>,
        inputs: Mutex<Vec<String>>,
        reports: Mutex<Vec<String>>,
        fail_at: Option<usize>,
    }

    impl ScriptedEngine {
        fn covering(symbols: &SymbolSet) -> Self {
            Self {
                symbols: symbols.iter().map(|s| s.as_str().to_string()).collect(),
                ..Self::default()
            }
        }

        fn inputs(&self) -> Vec<String> {
            self.inputs.lock().unwrap().clone()
        }

        fn reports(&self) -> Vec<String> {
            self.reports.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReasoningEngine for ScriptedEngine {
        async fn reason(&self, _instruction: &str, input: &str, capabilities: &ToolRegistry) -> desk_core::Result<String> {
            let stage = {
                let mut inputs = self.inputs.lock().unwrap();
                inputs.push(input.to_string());
                inputs.len()
            };
            if self.fail_at == Some(stage) {
                return Err(desk_core::Error::ProcessingFailed("model unreachable".to_string()));
            }

            let mut findings = Vec::new();
            for symbol in &self.symbols {
                for kind in ReportKind::ALL {
                    let report = capabilities.invoke(kind.tool_name(), json!({"symbol": symbol})).await?;
                    let report = report.as_str().unwrap_or_default().to_string();
                    self.reports.lock().unwrap().push(report.clone());
                    if kind == ReportKind::Info {
                        findings.push(report);
                    }
                }
            }
            Ok(format!("### Findings\n{}\n\n### Notes\nStage {stage} done.", findings.join("\n")))
        }
    }

    fn desk(engine: Arc<ScriptedEngine>, symbols: &SymbolSet) -> ResearchDesk {
        ResearchDesk::new(Arc::new(MemorySource::sample(symbols)), engine, DeskConfig::default()).unwrap()
    }

    #[test]
    fn test_scenarios() {
        assert_eq!(scenario("Energy"), Some("XOM, CVX, BP"));
        assert_eq!(scenario("crypto"), None);
        for (_, symbols) in SCENARIOS {
            assert_eq!(symbols.parse::<SymbolSet>().unwrap().len(), 3);
        }
    }

    #[test]
    fn test_pipeline_shape() {
        let symbols: SymbolSet = DEFAULT_SYMBOLS.parse().unwrap();
        let desk = desk(Arc::new(ScriptedEngine::default()), &symbols);
        let facade = Arc::new(FinanceFacade::new(Arc::new(MemorySource::new())));

        let pipeline = desk.pipeline(&symbols, &facade).unwrap();
        assert_eq!(pipeline.stage_names(), ["Stock Analyst", "Research Analyst", "Investment Lead"]);
    }

    #[tokio::test]
    async fn test_run_writes_one_heading_per_stage() {
        let symbols: SymbolSet = DEFAULT_SYMBOLS.parse().unwrap();
        let engine = Arc::new(ScriptedEngine::covering(&symbols));
        let desk = desk(Arc::clone(&engine), &symbols);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.md");
        let document = desk.run_to_file(&symbols, &path).await.unwrap();

        let reports = engine.reports();
        assert_eq!(reports.len(), 3 * 3 * ReportKind::ALL.len());
        for report in &reports {
            assert!(!report.contains(NOT_AVAILABLE), "missing data in:\n{report}");
        }
        assert!(reports.iter().any(|r| r.starts_with("--- Option Chain Report for GOOGL ---")));

        let headings: Vec<_> = document.lines().filter(|l| l.starts_with("# ")).collect();
        assert_eq!(headings.len(), 3);
        assert!(headings[0].starts_with("# Stock Analyst ("));
        assert!(headings[2].starts_with("# Investment Lead ("));
        assert_eq!(document.matches("## Findings").count(), 3);
        assert!(document.contains("Core Information for AAPL"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), document);

        let inputs = engine.inputs();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[0], "Company name: AAPL, MSFT, GOOGL");
        assert!(inputs[1].starts_with("Company name: AAPL, MSFT, GOOGL\n\n### Findings"));
        assert!(inputs[1].contains("Stage 1 done."));
        assert!(inputs[2].contains("Stage 1 done."));
        assert!(inputs[2].contains("Stage 2 done."));
        assert!(inputs[2].find("Stage 1 done.") < inputs[2].find("Stage 2 done."));
    }

    #[tokio::test]
    async fn test_stage_failure_aborts_without_writing() {
        let symbols: SymbolSet = "NVDA".parse().unwrap();
        let engine = Arc::new(ScriptedEngine {
            fail_at: Some(2),
            ..ScriptedEngine::covering(&symbols)
        });
        let desk = desk(Arc::clone(&engine), &symbols);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.md");
        let err = desk.run_to_file(&symbols, &path).await.unwrap_err();

        assert!(err.to_string().contains("Research Analyst"));
        assert!(!path.exists());
        assert_eq!(engine.inputs().len(), 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = DeskConfig {
            max_iterations: 0,
            ..DeskConfig::default()
        };
        let result = ResearchDesk::new(
            Arc::new(MemorySource::new()),
            Arc::new(ScriptedEngine::default()),
            config,
        );
        assert!(result.is_err());
    }
}
