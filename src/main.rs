//! SpikeWatch - cloud cost spike detection and workflow retry
//!
//! `analyze` finds days whose spend exceeds a multiple of the daily average,
//! ranks the contributors behind them, writes a report, and posts a summary
//! plus an LLM narrative to chat. `retrigger` handles a workflow failure
//! event: the first failure of a lineage is restarted once, a second one is
//! escalated.
//!
//! Exit codes:
//!   0 - Success (including every retrigger outcome)
//!   1 - Runtime error (bad data, config, unreadable event, etc.)
//!   2 - Spikes found with --fail-on-spike

mod analysis;
mod cli;
mod config;
mod external;
mod models;
mod notify;
mod report;
mod retry;
mod source;
mod summarizer;

use analysis::SpikeAnalyzer;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{AnalyzeArgs, Args, Command, OutputFormat, RetriggerArgs};
use config::{Config, SummarizerConfig, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::{AnalysisReport, ReportMetadata};
use notify::{LogNotifier, Notifier};
use retry::{
    DryRunWorkflowClient, FailureEvent, RetryCoordinator, StepFunctionsCliClient, WorkflowClient,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use summarizer::{OllamaSummarizer, Summarizer};
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let loaded = load_config(&args);
    let config_verbose = match loaded {
        Ok((ref config, _)) => config.general.verbose,
        Err(_) => false,
    };
    init_logging(&args, config_verbose)?;

    info!("SpikeWatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = match loaded {
        Ok((config, origin)) => {
            origin.log();
            match args.command {
                Some(Command::Analyze(ref analyze)) => {
                    run_analyze(config, analyze, args.quiet).await
                }
                Some(Command::Retrigger(ref retrigger)) => run_retrigger(config, retrigger).await,
                None => Ok(0),
            }
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default configuration file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize thresholds, data source, model, and notifications.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args, config_verbose: bool) -> Result<()> {
    let level = args.log_level(config_verbose).as_str().to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Where the configuration came from, logged once logging is up.
enum ConfigOrigin {
    Explicit(PathBuf),
    DefaultFile,
    Defaults,
    Fallback(String),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigOrigin::DefaultFile => {
                info!("Loaded default config from {}", CONFIG_FILE_NAME)
            }
            ConfigOrigin::Defaults => debug!("No config file found, using defaults"),
            ConfigOrigin::Fallback(e) => warn!("Failed to load config: {}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigOrigin::Defaults)),
        Err(e) => Ok((Config::default(), ConfigOrigin::Fallback(e.to_string()))),
    }
}

fn ensure_valid(config: &Config) -> Result<()> {
    let problems = config.validate();
    if !problems.is_empty() {
        bail!("Invalid configuration:\n  - {}", problems.join("\n  - "));
    }
    Ok(())
}

/// Run the spike analysis workflow. Returns exit code (0 or 2).
async fn run_analyze(mut config: Config, args: &AnalyzeArgs, quiet: bool) -> Result<i32> {
    let start_time = Instant::now();

    config.merge_with_analyze_args(args);
    ensure_valid(&config)?;

    // Step 1: Load the cost data
    let source = source::source_from_config(&config.source, args.fetch);
    println!("📥 Loading cost data: {}", source.describe());
    let dataset = source.fetch().await.context("Failed to load cost data")?;
    info!(
        "Loaded {} records over {} periods",
        dataset.records.len(),
        dataset.periods.len()
    );

    // Step 2: Detect spikes
    println!("🔬 Analyzing daily costs...");
    let analyzer = SpikeAnalyzer::from(&config.analysis);
    let spikes = analyzer
        .analyze_dataset(&dataset)
        .context("Spike analysis failed")?;

    let scope = config.analysis.scope.clone();
    let summary = report::summary_text(&spikes, &scope, config.analysis.sample_days);

    // Step 3: Notify and summarize
    let notifier = notify::notifier_from_config(&config.notifier);
    let summarizer = build_summarizer(&config.summarizer);
    let prompt = summarizer::build_prompt(
        &spikes,
        &scope,
        &config.analysis.dimensions,
        config.analysis.sample_days,
    );
    let notify_timeout = config.notifier.timeout_seconds;

    let summary_post = report::summary_message(&scope, &summary);
    let (_, narrative) = futures::join!(
        notify::dispatch(notifier.as_ref(), &summary_post, notify_timeout),
        summarize(
            summarizer.as_deref(),
            &prompt,
            config.summarizer.timeout_seconds,
            !quiet
        )
    );

    if let Some(ref narrative) = narrative {
        let narrative_post = report::narrative_message(&scope, narrative);
        notify::dispatch(notifier.as_ref(), &narrative_post, notify_timeout).await;
    }

    // Step 4: Build and save the report
    let duration = start_time.elapsed().as_secs_f64();
    let metadata = ReportMetadata {
        scope: scope.clone(),
        data_source: source.describe(),
        analysis_date: Utc::now(),
        dimensions: config.analysis.dimensions.clone(),
        model_used: narrative
            .as_ref()
            .and(summarizer.as_ref())
            .map(|s| s.model().to_string()),
        days_analyzed: spikes.daily_totals.len(),
        records_analyzed: dataset.records.len(),
        duration_seconds: duration,
    };

    let analysis = AnalysisReport {
        metadata,
        spikes,
        narrative,
    };

    println!("\n📝 Generating report...");
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&analysis)?,
        OutputFormat::Markdown => report::generate_markdown_report(&analysis),
    };

    std::fs::write(&config.general.output, &output)
        .with_context(|| format!("Failed to write report to {}", config.general.output))?;

    println!("\n📊 {}", summary.replace('\n', "\n   "));
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        config.general.output
    );

    if args.fail_on_spike && analysis.spikes.has_spikes() {
        eprintln!(
            "\n⛔ {} spike day(s) found. Failing (exit code 2).",
            analysis.spikes.spike_days.len()
        );
        return Ok(2);
    }

    Ok(0)
}

fn build_summarizer(config: &SummarizerConfig) -> Option<Box<dyn Summarizer>> {
    if !config.enabled {
        info!("Summarization disabled");
        return None;
    }

    match OllamaSummarizer::new(config.clone()) {
        Ok(summarizer) => Some(Box::new(summarizer)),
        Err(e) => {
            warn!("Cannot create summarizer: {}", e);
            None
        }
    }
}

/// Request a narrative, returning `None` on any failure.
async fn summarize(
    summarizer: Option<&dyn Summarizer>,
    prompt: &str,
    timeout_secs: u64,
    show_spinner: bool,
) -> Option<String> {
    let summarizer = summarizer?;

    let spinner = show_spinner.then(|| {
        let pb = ProgressBar::new_spinner();
        let template = "{spinner:.green} {msg} [{elapsed}]";
        if let Ok(style) = ProgressStyle::default_spinner().template(template) {
            pb.set_style(style);
        }
        pb.set_message(format!("Summarizing with {}...", summarizer.model()));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let result = external::bounded(timeout_secs, summarizer.summarize(prompt)).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match result {
        Ok(narrative) => Some(narrative),
        Err(e) => {
            warn!("Summarization failed: {}", e);
            None
        }
    }
}

/// Handle one failure event. Every outcome exits 0.
async fn run_retrigger(mut config: Config, args: &RetriggerArgs) -> Result<i32> {
    config.merge_with_retrigger_args(args);
    ensure_valid(&config)?;

    let raw = read_event(args.event.as_deref()).await?;
    let event: FailureEvent =
        serde_json::from_str(&raw).context("Failed to parse failure event")?;

    let (workflow, notifier): (Arc<dyn WorkflowClient>, Arc<dyn Notifier>) = if args.dry_run {
        info!("Dry run: no execution will be started and no message sent");
        (Arc::new(DryRunWorkflowClient), Arc::new(LogNotifier))
    } else {
        (
            Arc::new(StepFunctionsCliClient::new(&config.retry)),
            Arc::from(notify::notifier_from_config(&config.notifier)),
        )
    };

    let notify_timeout = config.notifier.timeout_seconds;
    let coordinator = RetryCoordinator::new(workflow, notifier, config.retry, notify_timeout);
    let response = coordinator.handle_failure_event(&event).await;

    info!("Outcome: {}", response.body);
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(0)
}

async fn read_event(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event file {}", path.display())),
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read event from stdin")?;
            Ok(raw)
        }
    }
}
