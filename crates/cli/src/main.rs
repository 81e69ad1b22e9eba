//! CPU throttling CLI
//!
//! Measures how often Kubernetes containers are throttled by their CPU
//! limits, by reading each container's cgroup cpu.stat counters.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use config::{FileConfig, RunConfig};
use output::OutputFormat;
use std::path::PathBuf;
use std::process::ExitCode;
use throttle_lib::cluster::{self, KubeExecutor, KubePodLister};
use throttle_lib::{FleetAggregator, FleetReport, RunLogger, ThrottleError, ThrottleMetrics};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Calculate CPU throttling percentage for Kubernetes containers
#[derive(Parser)]
#[command(name = "cputhrottle")]
#[command(author, version, about = "Calculate CPU throttling percentage for Kubernetes containers", long_about = None)]
pub struct Cli {
    /// Kubernetes namespace
    #[arg(long, short, env = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Container name to monitor (defaults to each pod's first container)
    #[arg(long, short, env = "CONTAINER_NAME")]
    pub container_name: Option<String>,

    /// Label selector for pods
    #[arg(long, short, env = "LABEL_SELECTOR")]
    pub label_selector: Option<String>,

    /// Path to kubeconfig file (default: KUBECONFIG, ~/.kube/config, then in-cluster)
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Base path for the cgroup filesystem (overrides CGROUP_PATH env var)
    #[arg(long)]
    pub cgroup_path: Option<String>,

    /// Complete path to the cgroup cpu.stat file (overrides COMPLETE_CGROUP_PATH env var)
    #[arg(long)]
    pub complete_cgroup_path: Option<String>,

    /// Time to wait between measurements in seconds
    #[arg(long, env = "WAIT_SECONDS")]
    pub wait_seconds: Option<String>,

    /// What to do when a pod cannot be measured (skip-and-zero, fail-fast)
    #[arg(long, env = "FAILURE_POLICY")]
    pub failure_policy: Option<String>,

    /// Output format (json, table)
    #[arg(long, short, env = "OUTPUT_FORMAT")]
    pub format: Option<String>,

    /// Write Prometheus metrics to this file after the run
    #[arg(long, env = "METRICS_FILE")]
    pub metrics_file: Option<String>,

    /// Config file with defaults (default: ~/.config/cputhrottle/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log format for diagnostics on stderr
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(
        long,
        short,
        env = "VERBOSE",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub verbose: bool,
}

fn init_tracing(verbose: bool, log_format: LogFormat) {
    let default_filter = if verbose {
        "warn,throttle_lib=debug,cputhrottle=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    match log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn resolve_config(cli: &Cli) -> Result<RunConfig, ThrottleError> {
    let file = FileConfig::load(cli.config.as_deref())
        .map_err(|e| ThrottleError::Configuration(format!("{:#}", e)))?;
    RunConfig::resolve(cli, &file, |key| std::env::var(key).ok())
}

async fn measure(config: &RunConfig, logger: RunLogger) -> FleetReport {
    let settings = config.settings();
    let aggregator = FleetAggregator::new(settings, logger);

    let client = match cluster::connect(config.kubeconfig.as_deref()).await {
        Ok(client) => client,
        Err(e) => {
            let error = ThrottleError::Configuration(format!("{:#}", e));
            return FleetReport::failed(config.policy, config.wait, &error);
        }
    };

    let lister = KubePodLister::new(client.clone());
    let executor = KubeExecutor::new(client);

    aggregator
        .run_discovered(
            &lister,
            &executor,
            &config.namespace,
            config.label_selector.as_deref(),
            config.container_name.as_deref(),
        )
        .await
}

fn export_metrics(report: &FleetReport, path: &std::path::Path) -> Result<()> {
    let metrics = ThrottleMetrics::new().context("Failed to create metrics")?;
    metrics.record_report(report);
    let text = metrics.render().context("Failed to render metrics")?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let (report, format) = match resolve_config(&cli) {
        Ok(config) => {
            let logger = RunLogger::new(&config.namespace);
            let report = measure(&config, logger.clone()).await;

            if let Some(path) = &config.metrics_file {
                if let Err(e) = export_metrics(&report, path) {
                    logger.log_export_failure(&path.display().to_string(), &format!("{:#}", e));
                }
            }

            (report, config.format)
        }
        Err(error) => {
            let (policy, format) = config::fallback_reporting(&cli);
            (FleetReport::failed(policy, None, &error), format)
        }
    };

    let rendered = output::render_report(&report, format).context("Failed to render report")?;
    println!("{}", rendered);

    if report.is_error() {
        if matches!(format, OutputFormat::Json) {
            output::print_error(&report.message);
        }
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
