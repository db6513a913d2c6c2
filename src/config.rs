//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.spikewatch.toml` files.

use crate::retry::event::MIN_EXECUTION_NAME_LEN;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".spikewatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Spike analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Cost data source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Summarization settings.
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Notification channel settings.
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Retry coordinator settings.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "spike_report.md".to_string()
}

/// Spike detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// A day is a spike when it exceeds `multiplier * average`.
    #[serde(default = "default_multiplier")]
    pub multiplier: Decimal,

    /// Number of contributors kept per ranking.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// How many days and spikes go into the summary and the prompt.
    #[serde(default = "default_sample_days")]
    pub sample_days: usize,

    /// Category names of the dimension tuple, in key order.
    #[serde(default = "default_dimensions")]
    pub dimensions: Vec<String>,

    /// Label used in report titles and notifications.
    #[serde(default = "default_scope")]
    pub scope: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
            top_k: default_top_k(),
            sample_days: default_sample_days(),
            dimensions: default_dimensions(),
            scope: default_scope(),
        }
    }
}

fn default_multiplier() -> Decimal {
    Decimal::TWO
}

fn default_top_k() -> usize {
    5
}

fn default_sample_days() -> usize {
    3
}

fn default_dimensions() -> Vec<String> {
    vec!["Service".to_string(), "Region".to_string()]
}

fn default_scope() -> String {
    "All Services".to_string()
}

/// Cost data source settings.
///
/// The data file holds a Cost Explorer `get-cost-and-usage` document. When it
/// is missing and `fetch_if_missing` is set, the document is downloaded with
/// the AWS CLI using the remaining fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_data_file")]
    pub data_file: String,

    /// Download the data file when it does not exist.
    #[serde(default = "default_true")]
    pub fetch_if_missing: bool,

    /// Inclusive start date (YYYY-MM-DD).
    #[serde(default = "default_start")]
    pub start: String,

    /// Exclusive end date (YYYY-MM-DD).
    #[serde(default = "default_end")]
    pub end: String,

    #[serde(default = "default_granularity")]
    pub granularity: String,

    /// Metric read from each group, e.g. `UnblendedCost`.
    #[serde(default = "default_metric")]
    pub metric: String,

    /// Cost Explorer dimensions to group by, in key order.
    #[serde(default = "default_group_by")]
    pub group_by: Vec<String>,

    /// Restrict to one service, e.g. `AWS Glue`.
    #[serde(default)]
    pub service_filter: Option<String>,

    #[serde(default)]
    pub aws_profile: Option<String>,

    #[serde(default = "default_command_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            fetch_if_missing: true,
            start: default_start(),
            end: default_end(),
            granularity: default_granularity(),
            metric: default_metric(),
            group_by: default_group_by(),
            service_filter: None,
            aws_profile: None,
            timeout_seconds: default_command_timeout(),
        }
    }
}

fn default_data_file() -> String {
    "cost_and_usage.json".to_string()
}

fn default_start() -> String {
    "2025-08-01".to_string()
}

fn default_end() -> String {
    "2025-09-01".to_string()
}

fn default_granularity() -> String {
    "DAILY".to_string()
}

fn default_metric() -> String {
    "UnblendedCost".to_string()
}

fn default_group_by() -> Vec<String> {
    vec!["SERVICE".to_string(), "REGION".to_string()]
}

fn default_command_timeout() -> u64 {
    120
}

/// Summarization (LLM) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_summarizer_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ollama_url: default_ollama_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_seconds: default_summarizer_timeout(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "mistral".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_summarizer_timeout() -> u64 {
    600
}

/// Chat notification settings (Webex messages API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_webex_url")]
    pub api_url: String,

    /// Destination room. Usually supplied through `WEBEX_ROOM_ID`.
    #[serde(default)]
    pub room_id: Option<String>,

    /// Bot token. Usually supplied through `WEBEX_BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Send as markdown rather than plain text.
    #[serde(default = "default_true")]
    pub markdown: bool,

    /// Longer messages are truncated.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    #[serde(default = "default_notifier_timeout")]
    pub timeout_seconds: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_webex_url(),
            room_id: None,
            bot_token: None,
            markdown: true,
            max_message_chars: default_max_message_chars(),
            timeout_seconds: default_notifier_timeout(),
        }
    }
}

fn default_webex_url() -> String {
    "https://webexapis.com/v1/messages".to_string()
}

fn default_max_message_chars() -> usize {
    7000
}

fn default_notifier_timeout() -> u64 {
    30
}

/// Retry coordinator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Payload field whose presence marks a lineage as already retried.
    #[serde(default = "default_marker_field")]
    pub marker_field: String,

    /// Execution name length limit of the workflow platform.
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,

    /// Name used when the failure event carries none.
    #[serde(default = "default_execution_name")]
    pub default_name: String,

    /// Bound on the start-execution call.
    #[serde(default = "default_command_timeout")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub aws_profile: Option<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            marker_field: default_marker_field(),
            max_name_len: default_max_name_len(),
            default_name: default_execution_name(),
            timeout_seconds: default_command_timeout(),
            aws_profile: None,
        }
    }
}

fn default_marker_field() -> String {
    "rerun_date_time_stamp".to_string()
}

fn default_max_name_len() -> usize {
    80
}

fn default_execution_name() -> String {
    "retriggered_execution".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge the `analyze` subcommand arguments into this configuration.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_analyze_args(&mut self, args: &crate::cli::AnalyzeArgs) {
        if let Some(multiplier) = args.multiplier {
            self.analysis.multiplier = multiplier;
        }
        if let Some(top_k) = args.top_k {
            self.analysis.top_k = top_k;
        }
        if let Some(ref dimensions) = args.dimensions {
            self.analysis.dimensions = dimensions.clone();
        }
        if let Some(ref scope) = args.scope {
            self.analysis.scope = scope.clone();
        }

        if let Some(ref data_file) = args.data_file {
            self.source.data_file = data_file.display().to_string();
        }
        if let Some(ref group_by) = args.group_by {
            self.source.group_by = group_by.clone();
        }
        if let Some(ref service) = args.service_filter {
            self.source.service_filter = Some(service.clone());
        }
        if let Some(ref profile) = args.aws_profile {
            self.source.aws_profile = Some(profile.clone());
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if let Some(ref model) = args.model {
            self.summarizer.model = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.summarizer.ollama_url = url.clone();
        }
        if args.no_summary {
            self.summarizer.enabled = false;
        }

        self.merge_notifier_args(&args.notify);
    }

    /// Merge the `retrigger` subcommand arguments into this configuration.
    pub fn merge_with_retrigger_args(&mut self, args: &crate::cli::RetriggerArgs) {
        if let Some(ref profile) = args.aws_profile {
            self.retry.aws_profile = Some(profile.clone());
        }
        self.merge_notifier_args(&args.notify);
    }

    fn merge_notifier_args(&mut self, args: &crate::cli::NotifyArgs) {
        if let Some(ref room_id) = args.room_id {
            self.notifier.room_id = Some(room_id.clone());
        }
        if let Some(ref token) = args.bot_token {
            self.notifier.bot_token = Some(token.clone());
        }
        if args.no_notify {
            self.notifier.enabled = false;
        }
    }

    /// Validate the configuration, returning every problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.analysis.multiplier <= Decimal::ZERO {
            issues.push(format!(
                "analysis.multiplier must be positive, got {}",
                self.analysis.multiplier
            ));
        }
        if self.analysis.top_k == 0 {
            issues.push("analysis.top_k must be at least 1".to_string());
        }
        if self.analysis.dimensions.is_empty() {
            issues.push("analysis.dimensions must name at least one category".to_string());
        }
        if !self.summarizer.ollama_url.starts_with("http://")
            && !self.summarizer.ollama_url.starts_with("https://")
        {
            issues.push(
                "summarizer.ollama_url must start with 'http://' or 'https://'".to_string(),
            );
        }
        if !(0.0..=1.0).contains(&self.summarizer.temperature) {
            issues.push("summarizer.temperature must be between 0.0 and 1.0".to_string());
        }
        if !self.notifier.api_url.starts_with("https://") {
            issues.push("notifier.api_url must start with 'https://'".to_string());
        }
        if self.notifier.max_message_chars == 0 {
            issues.push("notifier.max_message_chars must be at least 1".to_string());
        }
        if self.retry.max_name_len < MIN_EXECUTION_NAME_LEN {
            issues.push(format!(
                "retry.max_name_len must be at least {} to keep the timestamp suffix, got {}",
                MIN_EXECUTION_NAME_LEN, self.retry.max_name_len
            ));
        }
        if self.retry.marker_field.is_empty() {
            issues.push("retry.marker_field must not be empty".to_string());
        }

        for (name, timeout) in [
            ("source.timeout_seconds", self.source.timeout_seconds),
            ("summarizer.timeout_seconds", self.summarizer.timeout_seconds),
            ("notifier.timeout_seconds", self.notifier.timeout_seconds),
            ("retry.timeout_seconds", self.retry.timeout_seconds),
        ] {
            if timeout == 0 {
                issues.push(format!("{} must be at least 1 second", name));
            }
        }

        issues
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
