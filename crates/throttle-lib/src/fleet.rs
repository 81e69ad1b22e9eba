//! Fleet-wide throttling runs
//!
//! Measures every discovered target strictly one after another, in
//! discovery order, and folds the outcomes into a [`FleetReport`] according
//! to the configured [`FailurePolicy`].

use crate::calculator;
use crate::collector::{CgroupLocator, Sampler};
use crate::error::{ExecErrorKind, Result, ThrottleError};
use crate::models::{
    FailurePolicy, MeasurementSettings, SampleQuality, Target, ThrottlingResult,
};
use crate::observability::RunLogger;
use crate::remote::{RemoteExecutor, TargetLister};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

/// Whether counters were read once or twice
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasurementMode {
    Instantaneous,
    Differential { wait_seconds: f64 },
}

impl MeasurementMode {
    pub fn from_wait(wait: Option<Duration>) -> Self {
        match wait.filter(|w| !w.is_zero()) {
            Some(wait) => MeasurementMode::Differential {
                wait_seconds: wait.as_secs_f64(),
            },
            None => MeasurementMode::Instantaneous,
        }
    }
}

/// Serializable description of a failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_kind: Option<ExecErrorKind>,
    pub message: String,
}

impl From<&ThrottleError> for ErrorDetail {
    fn from(error: &ThrottleError) -> Self {
        Self {
            kind: error.kind().to_string(),
            exec_kind: error.exec_kind(),
            message: error.to_string(),
        }
    }
}

/// Per-pod entry of a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodReport {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
    pub throttling_percentage: f64,
    pub throttled_rate: f64,
    pub nr_periods: u64,
    pub nr_throttled: u64,
    pub throttled_time: u64,
    pub cgroup_path: String,
    pub sample: SampleQuality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periods_delta: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttled_delta: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttled_time_delta: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl PodReport {
    pub fn from_result(result: &ThrottlingResult) -> Self {
        Self {
            namespace: result.target.namespace.clone(),
            pod_name: result.target.pod_name.clone(),
            container_name: result.target.container_name.clone(),
            throttling_percentage: result.percentage,
            throttled_rate: result.rate,
            nr_periods: result.periods,
            nr_throttled: result.throttled,
            throttled_time: result.throttled_time,
            cgroup_path: result
                .cgroup_path
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            sample: result.quality,
            periods_delta: result.deltas.map(|d| d.periods_delta),
            throttled_delta: result.deltas.map(|d| d.throttled_delta),
            throttled_time_delta: result.deltas.map(|d| d.throttled_time_delta),
            error: None,
        }
    }

    /// Zero-valued entry for a target that failed
    pub fn failed(target: &Target, error: &ThrottleError) -> Self {
        let mut report = Self::from_result(&ThrottlingResult::no_data(target.clone()));
        report.error = Some(ErrorDetail::from(error));
        report
    }
}

/// Pod counts by sample quality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub measured: usize,
    pub zero_activity: usize,
    pub no_data: usize,
}

/// Result of a fleet run
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub status: RunStatus,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub policy: FailurePolicy,
    pub mode: MeasurementMode,
    pub pods: Vec<PodReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_average: Option<f64>,
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl FleetReport {
    /// Successful report with no pods
    pub fn empty(policy: FailurePolicy, wait: Option<Duration>) -> Self {
        Self {
            status: RunStatus::Success,
            timestamp: Utc::now(),
            message: "No pods found matching the criteria".to_string(),
            policy,
            mode: MeasurementMode::from_wait(wait),
            pods: Vec::new(),
            aggregate_average: None,
            summary: Summary::default(),
            error: None,
        }
    }

    /// Error report for a failure that happened before or outside any target
    pub fn failed(policy: FailurePolicy, wait: Option<Duration>, error: &ThrottleError) -> Self {
        Self {
            status: RunStatus::Error,
            message: error.to_string(),
            error: Some(ErrorDetail::from(error)),
            ..Self::empty(policy, wait)
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == RunStatus::Error
    }

    fn push(&mut self, pod: PodReport) {
        match pod.sample {
            SampleQuality::Measured => self.summary.measured += 1,
            SampleQuality::ZeroActivity => self.summary.zero_activity += 1,
            SampleQuality::NoData => self.summary.no_data += 1,
        }
        self.pods.push(pod);
    }

    /// Mean percentage over pods that actually had periods to measure
    fn finalize_average(&mut self) {
        let measured: Vec<f64> = self
            .pods
            .iter()
            .filter(|p| p.sample == SampleQuality::Measured)
            .map(|p| p.throttling_percentage)
            .collect();

        self.aggregate_average = if measured.is_empty() {
            None
        } else {
            Some(measured.iter().sum::<f64>() / measured.len() as f64)
        };
    }
}

/// Runs measurements across a set of targets
pub struct FleetAggregator {
    sampler: Sampler,
    settings: MeasurementSettings,
    logger: RunLogger,
}

impl FleetAggregator {
    pub fn new(settings: MeasurementSettings, logger: RunLogger) -> Self {
        let locator = CgroupLocator::new(settings.hint.clone()).with_diagnostics(settings.diagnostics);
        Self {
            sampler: Sampler::new(locator),
            settings,
            logger,
        }
    }

    pub fn settings(&self) -> &MeasurementSettings {
        &self.settings
    }

    /// Sample and compute a single target
    pub async fn measure(&self, executor: &dyn RemoteExecutor, target: &Target) -> Result<ThrottlingResult> {
        let pair = self
            .sampler
            .sample(executor, target, self.settings.effective_wait())
            .await?;
        calculator::compute(target, &pair)
    }

    /// Measure every target in order
    pub async fn run(&self, executor: &dyn RemoteExecutor, targets: &[Target]) -> FleetReport {
        let wait = self.settings.effective_wait();
        let policy = self.settings.policy;
        let mut report = FleetReport::empty(policy, wait);

        if targets.is_empty() {
            self.logger.log_run_finished(&report);
            return report;
        }

        self.logger
            .log_run_started(targets.len(), wait, &policy.to_string());

        for target in targets {
            match self.measure(executor, target).await {
                Ok(result) => {
                    self.logger.log_measured(&result);
                    report.push(PodReport::from_result(&result));
                }
                Err(error) => {
                    let skipped = policy == FailurePolicy::SkipAndZero;
                    self.logger.log_failed(target, &error, skipped);
                    report.push(PodReport::failed(target, &error));

                    if !skipped {
                        report.status = RunStatus::Error;
                        report.message = format!(
                            "Aborted at pod '{}' ({} of {}): {}",
                            target.pod_name,
                            report.pods.len(),
                            targets.len(),
                            error
                        );
                        report.error = Some(ErrorDetail::from(&error));
                        report.finalize_average();
                        self.logger.log_run_finished(&report);
                        return report;
                    }
                }
            }
        }

        report.finalize_average();
        report.message = if report.summary.no_data == 0 {
            "CPU throttling analysis completed".to_string()
        } else {
            format!(
                "CPU throttling analysis completed; {} of {} pods skipped with no data",
                report.summary.no_data,
                report.pods.len()
            )
        };

        self.logger.log_run_finished(&report);
        report
    }

    /// Discover targets then measure them
    pub async fn run_discovered(
        &self,
        lister: &dyn TargetLister,
        executor: &dyn RemoteExecutor,
        namespace: &str,
        label_selector: Option<&str>,
        container: Option<&str>,
    ) -> FleetReport {
        match lister.list_targets(namespace, label_selector, container).await {
            Ok(targets) => self.run(executor, &targets).await,
            Err(e) => {
                let error = ThrottleError::Discovery(format!("{:#}", e));
                let report = FleetReport::failed(self.settings.policy, self.settings.effective_wait(), &error);
                self.logger.log_run_finished(&report);
                report
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_wait() {
        assert_eq!(MeasurementMode::from_wait(None), MeasurementMode::Instantaneous);
        assert_eq!(
            MeasurementMode::from_wait(Some(Duration::ZERO)),
            MeasurementMode::Instantaneous
        );
        assert_eq!(
            MeasurementMode::from_wait(Some(Duration::from_millis(1500))),
            MeasurementMode::Differential { wait_seconds: 1.5 }
        );
    }

    #[test]
    fn test_empty_report_serialization() {
        let report = FleetReport::empty(FailurePolicy::SkipAndZero, None);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["policy"], "skip-and-zero");
        assert_eq!(json["mode"]["kind"], "instantaneous");
        assert_eq!(json["pods"].as_array().unwrap().len(), 0);
        assert!(json.get("aggregate_average").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_pod_entry_is_tagged_no_data() {
        let target = Target::new("prod", "web-0", "app");
        let error = ThrottleError::StatsNotFound {
            target: target.clone(),
            attempted: vec!["/sys/fs/cgroup/cpu.stat".to_string()],
        };
        let pod = PodReport::failed(&target, &error);

        assert_eq!(pod.sample, SampleQuality::NoData);
        assert_eq!(pod.throttling_percentage, 0.0);
        assert_eq!(pod.cgroup_path, "unknown");
        assert_eq!(pod.error.as_ref().unwrap().kind, "stats_not_found");

        let json = serde_json::to_value(&pod).unwrap();
        assert_eq!(json["sample"], "no_data");
        assert!(json.get("periods_delta").is_none());
    }

    #[test]
    fn test_average_ignores_unmeasured_pods() {
        let mut report = FleetReport::empty(FailurePolicy::SkipAndZero, None);
        let target = Target::new("prod", "a", "app");
        let mut measured = ThrottlingResult::no_data(target.clone());
        measured.quality = SampleQuality::Measured;
        measured.percentage = 30.0;
        let mut idle = ThrottlingResult::no_data(target.clone());
        idle.quality = SampleQuality::ZeroActivity;

        report.push(PodReport::from_result(&measured));
        report.push(PodReport::from_result(&idle));
        report.push(PodReport::from_result(&ThrottlingResult::no_data(target)));
        report.finalize_average();

        assert_eq!(report.aggregate_average, Some(30.0));
        assert_eq!(
            report.summary,
            Summary {
                measured: 1,
                zero_activity: 1,
                no_data: 1
            }
        );
    }
}
