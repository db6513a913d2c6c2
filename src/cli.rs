//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Args as ClapArgs, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// SpikeWatch - cloud cost spike detection and workflow retry
///
/// Finds days whose spend exceeds a multiple of the average, ranks the
/// services and regions behind them, and posts a summary to chat. Also
/// retriggers a failed workflow execution exactly once.
///
/// Examples:
///   spikewatch analyze --data-file last_two_months_costs.json
///   spikewatch analyze --dimensions Region --group-by REGION \
///       --service-filter "AWS Glue" --scope Glue
///   spikewatch retrigger --event failure.json
///   spikewatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .spikewatch.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .spikewatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Detect cost spikes and report the top contributors
    Analyze(AnalyzeArgs),
    /// Handle a workflow failure event: retry once, then escalate
    Retrigger(RetriggerArgs),
}

/// Arguments for `spikewatch analyze`.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Cost Explorer get-cost-and-usage JSON document
    #[arg(short, long, value_name = "FILE")]
    pub data_file: Option<PathBuf>,

    /// Download the data file even if it already exists
    #[arg(long)]
    pub fetch: bool,

    /// Spike threshold as a multiple of the daily average
    #[arg(short, long, value_name = "FACTOR")]
    pub multiplier: Option<Decimal>,

    /// Number of contributors to list per ranking
    #[arg(short = 'k', long, value_name = "COUNT")]
    pub top_k: Option<usize>,

    /// Category names of the grouping keys (comma-separated)
    ///
    /// Example: --dimensions Service,Region
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub dimensions: Option<Vec<String>>,

    /// Cost Explorer group-by dimensions used when fetching (comma-separated)
    ///
    /// Example: --group-by SERVICE,REGION
    #[arg(long, value_name = "KEYS", value_delimiter = ',')]
    pub group_by: Option<Vec<String>>,

    /// Restrict fetched data to one service
    #[arg(long, value_name = "SERVICE")]
    pub service_filter: Option<String>,

    /// AWS CLI profile used when fetching
    #[arg(long, value_name = "PROFILE", env = "AWS_PROFILE")]
    pub aws_profile: Option<String>,

    /// Label for this analysis in titles and messages
    #[arg(long, value_name = "LABEL")]
    pub scope: Option<String>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Skip the LLM narrative
    #[arg(long)]
    pub no_summary: bool,

    /// Ollama model used for the narrative
    #[arg(long, env = "SPIKEWATCH_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Exit with code 2 when at least one spike is found
    ///
    /// Useful for scheduled jobs and CI pipelines.
    #[arg(long)]
    pub fail_on_spike: bool,

    #[command(flatten)]
    pub notify: NotifyArgs,
}

/// Arguments for `spikewatch retrigger`.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RetriggerArgs {
    /// Failure event JSON file (reads stdin when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub event: Option<PathBuf>,

    /// Decide and report, but do not start executions or send messages
    #[arg(long)]
    pub dry_run: bool,

    /// AWS CLI profile used to start the execution
    #[arg(long, value_name = "PROFILE", env = "AWS_PROFILE")]
    pub aws_profile: Option<String>,

    #[command(flatten)]
    pub notify: NotifyArgs,
}

/// Notification channel overrides shared by both subcommands.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct NotifyArgs {
    /// Webex room to post to
    #[arg(long, env = "WEBEX_ROOM_ID", value_name = "ID")]
    pub room_id: Option<String>,

    /// Webex bot token
    #[arg(long, env = "WEBEX_BOT_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub bot_token: Option<String>,

    /// Do not send chat notifications
    #[arg(long)]
    pub no_notify: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match self.command {
            None => Err("No command given. Use 'analyze' or 'retrigger' (see --help)".to_string()),
            Some(Command::Analyze(ref analyze)) => analyze.validate(),
            Some(Command::Retrigger(ref retrigger)) => retrigger.validate(),
        }
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the config file's `general.verbose`; `--quiet`
    /// overrides it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl AnalyzeArgs {
    fn validate(&self) -> Result<(), String> {
        if let Some(multiplier) = self.multiplier {
            if multiplier <= Decimal::ZERO {
                return Err("Multiplier must be greater than zero".to_string());
            }
        }

        if self.top_k == Some(0) {
            return Err("Top-k must be at least 1".to_string());
        }

        if let Some(ref dimensions) = self.dimensions {
            if dimensions.iter().all(|d| d.trim().is_empty()) {
                return Err("At least one dimension name is required".to_string());
            }
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref data_file) = self.data_file {
            if data_file.is_dir() {
                return Err(format!(
                    "Data file path is a directory: {}",
                    data_file.display()
                ));
            }
        }

        Ok(())
    }
}

impl RetriggerArgs {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref event) = self.event {
            if !event.exists() {
                return Err(format!("Event file does not exist: {}", event.display()));
            }
        }
        Ok(())
    }
}
