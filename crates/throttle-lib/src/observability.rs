//! Observability for throttling runs
//!
//! Provides:
//! - Prometheus gauges for a finished run, rendered in text exposition
//!   format for the node-exporter textfile collector
//! - Structured logging of run events with tracing

use crate::error::ThrottleError;
use crate::fleet::{FleetReport, PodReport};
use crate::models::{SampleQuality, Target, ThrottlingResult};
use prometheus::{Encoder, Gauge, GaugeVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::time::Duration;
use tracing::{info, warn};

const POD_LABELS: &[&str] = &["namespace", "pod", "container"];

/// Prometheus metrics describing one run
///
/// Uses its own registry so repeated runs in one process never collide on
/// the global default registry.
pub struct ThrottleMetrics {
    registry: Registry,
    throttling_percentage: GaugeVec,
    throttled_rate: GaugeVec,
    pods: IntGaugeVec,
    aggregate_percentage: Gauge,
}

impl ThrottleMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let throttling_percentage = GaugeVec::new(
            Opts::new(
                "cpu_throttling_percentage",
                "Share of CPU scheduling periods in which the container was throttled",
            ),
            POD_LABELS,
        )?;
        let throttled_rate = GaugeVec::new(
            Opts::new(
                "cpu_throttled_rate",
                "Throttled time normalized against the nominal scheduling period",
            ),
            POD_LABELS,
        )?;
        let pods = IntGaugeVec::new(
            Opts::new("cpu_throttling_pods", "Pods in the last run by sample quality"),
            &["sample"],
        )?;
        let aggregate_percentage = Gauge::new(
            "cpu_throttling_aggregate_percentage",
            "Mean throttling percentage across measured pods",
        )?;

        registry.register(Box::new(throttling_percentage.clone()))?;
        registry.register(Box::new(throttled_rate.clone()))?;
        registry.register(Box::new(pods.clone()))?;
        registry.register(Box::new(aggregate_percentage.clone()))?;

        Ok(Self {
            registry,
            throttling_percentage,
            throttled_rate,
            pods,
            aggregate_percentage,
        })
    }

    /// Load the figures of a finished report
    pub fn record_report(&self, report: &FleetReport) {
        for pod in &report.pods {
            self.record_pod(pod);
        }

        self.pods
            .with_label_values(&["measured"])
            .set(report.summary.measured as i64);
        self.pods
            .with_label_values(&["zero_activity"])
            .set(report.summary.zero_activity as i64);
        self.pods
            .with_label_values(&["no_data"])
            .set(report.summary.no_data as i64);

        if let Some(average) = report.aggregate_average {
            self.aggregate_percentage.set(average);
        }
    }

    fn record_pod(&self, pod: &PodReport) {
        // A placeholder zero would be indistinguishable from a healthy pod
        if pod.sample == SampleQuality::NoData {
            return;
        }

        let labels = [pod.namespace.as_str(), pod.pod_name.as_str(), pod.container_name.as_str()];
        self.throttling_percentage
            .with_label_values(&labels)
            .set(pod.throttling_percentage);
        self.throttled_rate
            .with_label_values(&labels)
            .set(pod.throttled_rate);
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for measurement events
///
/// Provides consistent field names for per-pod results and run summaries.
#[derive(Clone)]
pub struct RunLogger {
    namespace: String,
}

impl RunLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Log the start of a run
    pub fn log_run_started(&self, targets: usize, wait: Option<Duration>, policy: &str) {
        info!(
            event = "run_started",
            namespace = %self.namespace,
            targets = targets,
            wait_secs = wait.map(|w| w.as_secs_f64()),
            policy = %policy,
            "Measuring CPU throttling"
        );
    }

    /// Log a measured pod
    pub fn log_measured(&self, result: &ThrottlingResult) {
        let target = &result.target;
        match result.quality {
            SampleQuality::ZeroActivity => {
                info!(
                    event = "pod_zero_activity",
                    namespace = %self.namespace,
                    pod_name = %target.pod_name,
                    container = %target.container_name,
                    nr_periods = result.periods,
                    cgroup_path = ?result.cgroup_path,
                    "No CPU periods elapsed, reporting 0% throttling"
                );
            }
            _ => {
                info!(
                    event = "pod_measured",
                    namespace = %self.namespace,
                    pod_name = %target.pod_name,
                    container = %target.container_name,
                    throttling_percentage = result.percentage,
                    throttled_rate = result.rate,
                    nr_periods = result.periods,
                    nr_throttled = result.throttled,
                    periods_delta = result.deltas.map(|d| d.periods_delta),
                    throttled_delta = result.deltas.map(|d| d.throttled_delta),
                    cgroup_path = ?result.cgroup_path,
                    "Measured CPU throttling"
                );
                if result.percentage > 100.0 {
                    warn!(
                        event = "throttling_out_of_range",
                        namespace = %self.namespace,
                        pod_name = %target.pod_name,
                        throttling_percentage = result.percentage,
                        "Throttled periods exceed total periods"
                    );
                }
            }
        }
    }

    /// Log a pod that could not be measured
    pub fn log_failed(&self, target: &Target, error: &ThrottleError, skipped: bool) {
        warn!(
            event = "pod_failed",
            namespace = %self.namespace,
            pod_name = %target.pod_name,
            container = %target.container_name,
            error_kind = %error.kind(),
            error = %error,
            skipped = skipped,
            "Could not measure CPU throttling"
        );
    }

    /// Log the end of a run
    pub fn log_run_finished(&self, report: &FleetReport) {
        if report.is_error() {
            warn!(
                event = "run_failed",
                namespace = %self.namespace,
                pods = report.pods.len(),
                message = %report.message,
                "CPU throttling analysis aborted"
            );
        } else {
            info!(
                event = "run_finished",
                namespace = %self.namespace,
                measured = report.summary.measured,
                zero_activity = report.summary.zero_activity,
                no_data = report.summary.no_data,
                aggregate_average = report.aggregate_average,
                "CPU throttling analysis completed"
            );
        }
    }

    /// Log a non-fatal problem exporting results
    pub fn log_export_failure(&self, destination: &str, error: &dyn std::fmt::Display) {
        warn!(
            event = "export_failed",
            namespace = %self.namespace,
            destination = %destination,
            error = %error,
            "Failed to export metrics"
        );
    }
}
