//! Core data models for throttling measurement

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One measurement unit: a container inside a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
}

impl Target {
    pub fn new(
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: container_name.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}[{}]", self.namespace, self.pod_name, self.container_name)
    }
}

/// Where to look for cpu.stat inside the container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PathHint {
    /// Probe the default cgroup v2 then v1 locations
    #[default]
    None,
    /// Probe `{dir}/cpu.stat` then `{dir}/cpu/cpu.stat`
    BasePath(String),
    /// Read only this file
    ExactPath(String),
}

impl PathHint {
    /// Candidate files in probe order
    pub fn candidates(&self) -> Vec<String> {
        match self {
            PathHint::None => vec![
                "/sys/fs/cgroup/cpu.stat".to_string(),
                "/sys/fs/cgroup/cpu/cpu.stat".to_string(),
            ],
            PathHint::BasePath(base) => {
                let base = base.trim_end_matches('/');
                vec![format!("{}/cpu.stat", base), format!("{}/cpu/cpu.stat", base)]
            }
            PathHint::ExactPath(path) => vec![path.clone()],
        }
    }

    /// Directory worth listing when nothing was found
    pub fn diagnostic_root(&self) -> String {
        match self {
            PathHint::BasePath(base) => base.clone(),
            _ => "/sys/fs/cgroup/".to_string(),
        }
    }
}

/// Counters read from one cpu.stat file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatCounters {
    pub nr_periods: u64,
    pub nr_throttled: u64,
    /// Raw throttled-time counter as the kernel reports it
    /// (`throttled_usec` on v2, `throttled_time` on v1)
    pub throttled_time: u64,
}

/// A parsed cpu.stat reading with provenance
#[derive(Debug, Clone, PartialEq)]
pub struct StatSnapshot {
    pub counters: StatCounters,
    pub resolved_path: String,
    pub taken_at: DateTime<Utc>,
}

/// One or two snapshots of the same target
#[derive(Debug, Clone, PartialEq)]
pub enum SamplePair {
    Instantaneous(StatSnapshot),
    Differential {
        before: StatSnapshot,
        after: StatSnapshot,
    },
}

impl SamplePair {
    pub fn before(&self) -> &StatSnapshot {
        match self {
            SamplePair::Instantaneous(snapshot) => snapshot,
            SamplePair::Differential { before, .. } => before,
        }
    }

    pub fn after(&self) -> &StatSnapshot {
        match self {
            SamplePair::Instantaneous(snapshot) => snapshot,
            SamplePair::Differential { after, .. } => after,
        }
    }
}

/// How a result's numbers came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleQuality {
    /// Periods elapsed and the ratio is meaningful
    Measured,
    /// No scheduling periods in the window; values are zero by convention
    ZeroActivity,
    /// The target could not be measured; values are zero placeholders
    NoData,
}

/// Counter differences across a differential sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDeltas {
    pub periods_delta: u64,
    pub throttled_delta: u64,
    pub throttled_time_delta: u64,
}

/// Throttling figures for a single target
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottlingResult {
    pub target: Target,
    pub percentage: f64,
    pub rate: f64,
    pub periods: u64,
    pub throttled: u64,
    pub throttled_time: u64,
    pub cgroup_path: Option<String>,
    pub deltas: Option<CounterDeltas>,
    pub quality: SampleQuality,
}

impl ThrottlingResult {
    /// Zero-valued placeholder for a target that could not be measured
    pub fn no_data(target: Target) -> Self {
        Self {
            target,
            percentage: 0.0,
            rate: 0.0,
            periods: 0,
            throttled: 0,
            throttled_time: 0,
            cgroup_path: None,
            deltas: None,
            quality: SampleQuality::NoData,
        }
    }
}

/// How a single target's failure affects the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Record a zero-valued no-data entry and continue
    #[default]
    SkipAndZero,
    /// Abort the run on the first failing target
    FailFast,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::SkipAndZero => write!(f, "skip-and-zero"),
            FailurePolicy::FailFast => write!(f, "fail-fast"),
        }
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip-and-zero" | "skip_and_zero" | "skip" => Ok(FailurePolicy::SkipAndZero),
            "fail-fast" | "fail_fast" => Ok(FailurePolicy::FailFast),
            other => Err(format!(
                "unknown failure policy '{}' (expected skip-and-zero or fail-fast)",
                other
            )),
        }
    }
}

/// Settings shared by every target in a run
#[derive(Debug, Clone, Default)]
pub struct MeasurementSettings {
    pub hint: PathHint,
    /// `None` or zero means instantaneous mode
    pub wait: Option<Duration>,
    pub policy: FailurePolicy,
    /// List the cgroup directory when cpu.stat cannot be found
    pub diagnostics: bool,
}

impl MeasurementSettings {
    /// The wait to apply, if differential mode is active
    pub fn effective_wait(&self) -> Option<Duration> {
        self.wait.filter(|wait| !wait.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_candidates_prefer_v2() {
        assert_eq!(
            PathHint::None.candidates(),
            vec!["/sys/fs/cgroup/cpu.stat", "/sys/fs/cgroup/cpu/cpu.stat"]
        );
    }

    #[test]
    fn test_base_path_candidates_trim_trailing_slash() {
        let hint = PathHint::BasePath("/host/cgroup/".to_string());
        assert_eq!(
            hint.candidates(),
            vec!["/host/cgroup/cpu.stat", "/host/cgroup/cpu/cpu.stat"]
        );
        assert_eq!(hint.diagnostic_root(), "/host/cgroup/");
    }

    #[test]
    fn test_exact_path_is_sole_candidate() {
        let hint = PathHint::ExactPath("/custom/cpu.stat".to_string());
        assert_eq!(hint.candidates(), vec!["/custom/cpu.stat"]);
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!("fail-fast".parse::<FailurePolicy>(), Ok(FailurePolicy::FailFast));
        assert_eq!(
            "Skip-And-Zero".parse::<FailurePolicy>(),
            Ok(FailurePolicy::SkipAndZero)
        );
        assert!("retry".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_zero_wait_is_instantaneous() {
        let settings = MeasurementSettings {
            wait: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_eq!(settings.effective_wait(), None);
    }
}
