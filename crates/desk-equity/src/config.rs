//! Configuration for the research desk

use desk_runtime::ExecutorConfig;
use desk_utils::{env_parse, env_var};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::YahooConfig;
use crate::error::{EquityError, Result};
use crate::facade::DEFAULT_HISTORY_PERIOD;

/// Lookback periods the chart API accepts
pub const HISTORY_PERIODS: [&str; 11] = ["1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max"];

/// Configuration for a research desk run
#[derive(Debug, Clone, PartialEq)]
pub struct DeskConfig {
    /// Model or deployment name used by every stage
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Model calls allowed per stage before it is abandoned
    pub max_iterations: usize,
    /// Lookback used by history requests that name no period
    pub history_period: String,
    /// Yahoo Finance requests per second
    pub requests_per_second: u32,
    pub request_timeout: Duration,
    /// Where the research document is written
    pub output_path: PathBuf,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            max_iterations: 12,
            history_period: DEFAULT_HISTORY_PERIOD.to_string(),
            requests_per_second: 4,
            request_timeout: Duration::from_secs(30),
            output_path: PathBuf::from("result.md"),
        }
    }
}

impl DeskConfig {
    /// Create a new configuration builder
    pub fn builder() -> DeskConfigBuilder {
        DeskConfigBuilder::default()
    }

    /// Defaults overridden by `DESK_*` environment variables
    ///
    /// `OPENAI_MODEL` is honoured when `DESK_MODEL` is unset.
    ///
    /// # Errors
    ///
    /// Fails when a variable does not parse or the result does not validate.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(model) = env_var("DESK_MODEL").or_else(|| env_var("OPENAI_MODEL")) {
            builder = builder.model(model);
        }
        if let Some(max_tokens) = env_parse("DESK_MAX_TOKENS")? {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = env_parse("DESK_TEMPERATURE")? {
            builder = builder.temperature(temperature);
        }
        if let Some(max_iterations) = env_parse("DESK_MAX_ITERATIONS")? {
            builder = builder.max_iterations(max_iterations);
        }
        if let Some(period) = env_var("DESK_HISTORY_PERIOD") {
            builder = builder.history_period(period);
        }
        if let Some(rps) = env_parse("DESK_YAHOO_RPS")? {
            builder = builder.requests_per_second(rps);
        }
        if let Some(secs) = env_parse("DESK_REQUEST_TIMEOUT_SECS")? {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(path) = env_var("DESK_OUTPUT") {
            builder = builder.output_path(path);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(EquityError::Config("model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(EquityError::Config("max_tokens must be greater than 0".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EquityError::Config(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.max_iterations == 0 {
            return Err(EquityError::Config("max_iterations must be greater than 0".to_string()));
        }
        if !HISTORY_PERIODS.contains(&self.history_period.as_str()) {
            return Err(EquityError::Config(format!(
                "history_period must be one of {}, got '{}'",
                HISTORY_PERIODS.join(", "),
                self.history_period
            )));
        }
        if self.requests_per_second == 0 {
            return Err(EquityError::Config("requests_per_second must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Tool-loop settings for every stage
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_iterations: self.max_iterations,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        }
    }

    /// Settings for the Yahoo Finance source
    pub fn yahoo_config(&self) -> YahooConfig {
        YahooConfig {
            requests_per_second: NonZeroU32::new(self.requests_per_second).unwrap_or(NonZeroU32::MIN),
            timeout: self.request_timeout,
        }
    }
}

/// Builder for [`DeskConfig`]
#[derive(Debug, Default)]
pub struct DeskConfigBuilder {
    model: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    max_iterations: Option<usize>,
    history_period: Option<String>,
    requests_per_second: Option<u32>,
    request_timeout: Option<Duration>,
    output_path: Option<PathBuf>,
}

impl DeskConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn history_period(mut self, period: impl Into<String>) -> Self {
        self.history_period = Some(period.into());
        self
    }

    pub fn requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = Some(rps);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<DeskConfig> {
        let defaults = DeskConfig::default();

        let config = DeskConfig {
            model: self.model.unwrap_or(defaults.model),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            history_period: self.history_period.unwrap_or(defaults.history_period),
            requests_per_second: self.requests_per_second.unwrap_or(defaults.requests_per_second),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            output_path: self.output_path.unwrap_or(defaults.output_path),
        };

        config.validate()?;
        Ok(config)
    }
}
