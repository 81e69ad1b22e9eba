//! Run configuration
//!
//! Every setting resolves once at startup with the precedence
//! flag > environment variable > config file > default. Clap merges the
//! flag and environment layers but hands typed values over as raw strings,
//! so a bad value from any layer becomes a configuration error report. The
//! cgroup path hint is resolved here because a path flag must discard both
//! path variables.

use crate::output::OutputFormat;
use crate::Cli;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use throttle_lib::{FailurePolicy, MeasurementSettings, PathHint, ThrottleError};

pub const ENV_CGROUP_PATH: &str = "CGROUP_PATH";
pub const ENV_COMPLETE_CGROUP_PATH: &str = "COMPLETE_CGROUP_PATH";

/// Defaults loaded from the optional config file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub namespace: Option<String>,
    pub container_name: Option<String>,
    pub label_selector: Option<String>,
    pub kubeconfig: Option<String>,
    pub cgroup_path: Option<String>,
    pub complete_cgroup_path: Option<String>,
    pub wait_seconds: Option<f64>,
    pub failure_policy: Option<String>,
    pub format: Option<String>,
    pub metrics_file: Option<String>,
}

impl FileConfig {
    /// Load the config file; a missing default file is not an error
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// `~/.config/cputhrottle/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("cputhrottle").join("config.json"))
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub namespace: String,
    pub container_name: Option<String>,
    pub label_selector: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub hint: PathHint,
    pub wait: Option<Duration>,
    pub policy: FailurePolicy,
    pub format: OutputFormat,
    pub metrics_file: Option<PathBuf>,
    pub verbose: bool,
}

impl RunConfig {
    /// Resolve from parsed flags, the config file and an environment lookup
    pub fn resolve<F>(cli: &Cli, file: &FileConfig, env: F) -> Result<Self, ThrottleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = first_set(cli.namespace.clone(), file.namespace.clone()).ok_or_else(|| {
            ThrottleError::Configuration(
                "namespace is required (use --namespace or NAMESPACE)".to_string(),
            )
        })?;

        let hint = resolve_hint(cli, file, &env)?;

        let wait = match (non_empty(cli.wait_seconds.clone()), file.wait_seconds) {
            (Some(raw), _) => Some(wait_duration(parse_seconds(&raw)?)?),
            (None, Some(secs)) => Some(wait_duration(secs)?),
            (None, None) => None,
        };

        let policy = first_set(cli.failure_policy.clone(), file.failure_policy.clone())
            .map(|raw| parse_policy(&raw))
            .transpose()?
            .unwrap_or_default();

        let format = first_set(cli.format.clone(), file.format.clone())
            .map(|raw| parse_format(&raw))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            namespace,
            container_name: first_set(cli.container_name.clone(), file.container_name.clone()),
            label_selector: first_set(cli.label_selector.clone(), file.label_selector.clone()),
            kubeconfig: first_set(cli.kubeconfig.clone(), file.kubeconfig.clone()).map(PathBuf::from),
            hint,
            wait,
            policy,
            format,
            metrics_file: first_set(cli.metrics_file.clone(), file.metrics_file.clone())
                .map(PathBuf::from),
            verbose: cli.verbose,
        })
    }

    /// Settings handed to the fleet aggregator
    pub fn settings(&self) -> MeasurementSettings {
        MeasurementSettings {
            hint: self.hint.clone(),
            wait: self.wait,
            policy: self.policy,
            diagnostics: self.verbose,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn first_set(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    non_empty(primary).or_else(|| non_empty(fallback))
}

/// Policy and format for reporting a configuration error
///
/// Unparseable values fall back to defaults so the error report can still
/// be rendered.
pub fn fallback_reporting(cli: &Cli) -> (FailurePolicy, OutputFormat) {
    let policy = non_empty(cli.failure_policy.clone())
        .and_then(|raw| parse_policy(&raw).ok())
        .unwrap_or_default();
    let format = non_empty(cli.format.clone())
        .and_then(|raw| parse_format(&raw).ok())
        .unwrap_or_default();
    (policy, format)
}

fn parse_policy(raw: &str) -> Result<FailurePolicy, ThrottleError> {
    raw.trim().parse().map_err(ThrottleError::Configuration)
}

fn parse_format(raw: &str) -> Result<OutputFormat, ThrottleError> {
    OutputFormat::from_str(raw.trim(), true)
        .map_err(|_| ThrottleError::Configuration(format!("unknown output format '{}'", raw)))
}

fn parse_seconds(raw: &str) -> Result<f64, ThrottleError> {
    raw.trim().parse().map_err(|_| {
        ThrottleError::Configuration(format!("wait seconds must be a number, got '{}'", raw))
    })
}

fn wait_duration(secs: f64) -> Result<Duration, ThrottleError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ThrottleError::Configuration(format!(
            "wait seconds must be a non-negative number, got {}",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ThrottleError::Configuration(format!("invalid wait seconds {}: {}", secs, e)))
}

/// Pick the hint from the highest layer that sets any path at all
fn resolve_hint<F>(cli: &Cli, file: &FileConfig, env: &F) -> Result<PathHint, ThrottleError>
where
    F: Fn(&str) -> Option<String>,
{
    let layers = [
        (
            non_empty(cli.cgroup_path.clone()),
            non_empty(cli.complete_cgroup_path.clone()),
            "--cgroup-path and --complete-cgroup-path",
        ),
        (
            non_empty(env(ENV_CGROUP_PATH)),
            non_empty(env(ENV_COMPLETE_CGROUP_PATH)),
            "CGROUP_PATH and COMPLETE_CGROUP_PATH",
        ),
        (
            non_empty(file.cgroup_path.clone()),
            non_empty(file.complete_cgroup_path.clone()),
            "cgroup_path and complete_cgroup_path in the config file",
        ),
    ];

    for (base, exact, names) in layers {
        match (base, exact) {
            (Some(_), Some(_)) => {
                return Err(ThrottleError::Configuration(format!(
                    "{} are mutually exclusive",
                    names
                )));
            }
            (Some(base), None) => return Ok(PathHint::BasePath(base)),
            (None, Some(exact)) => return Ok(PathHint::ExactPath(exact)),
            (None, None) => {}
        }
    }

    Ok(PathHint::None)
}
