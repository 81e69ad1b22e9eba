//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use throttle_lib::{FleetReport, MeasurementMode, PodReport, SampleQuality};

/// Output format for the report
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    #[default]
    Json,
    /// Table format
    Table,
}

/// Row for the per-pod table
#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Throttling")]
    throttling: String,
    #[tabled(rename = "Rate")]
    rate: String,
    #[tabled(rename = "Periods")]
    periods: String,
    #[tabled(rename = "Throttled")]
    throttled: String,
    #[tabled(rename = "Sample")]
    sample: String,
    #[tabled(rename = "Cgroup Path")]
    cgroup_path: String,
}

impl PodRow {
    fn new(pod: &PodReport) -> Self {
        let with_delta = |absolute: u64, delta: Option<u64>| match delta {
            Some(delta) => format!("{} (+{})", absolute, delta),
            None => absolute.to_string(),
        };

        Self {
            pod: pod.pod_name.clone(),
            container: pod.container_name.clone(),
            throttling: color_percentage(pod.throttling_percentage, pod.sample),
            rate: format!("{:.6}", pod.throttled_rate),
            periods: with_delta(pod.nr_periods, pod.periods_delta),
            throttled: with_delta(pod.nr_throttled, pod.throttled_delta),
            sample: color_sample(pod.sample),
            cgroup_path: pod.cgroup_path.clone(),
        }
    }
}

/// Render a report in the requested format
pub fn render_report(report: &FleetReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report),
        OutputFormat::Table => Ok(render_table(report)),
    }
}

fn render_table(report: &FleetReport) -> String {
    let mut out = String::new();

    let status = if report.is_error() {
        "ERROR".red().bold().to_string()
    } else {
        "OK".green().bold().to_string()
    };
    out.push_str(&format!("{} {}\n", status, report.message));
    out.push_str(&format!(
        "Mode: {}   Policy: {}\n",
        format_mode(&report.mode),
        report.policy
    ));

    if report.pods.is_empty() {
        out.push_str(&format!("{}\n", "No pods measured".yellow()));
        return out;
    }

    let rows: Vec<PodRow> = report.pods.iter().map(PodRow::new).collect();
    out.push_str(&Table::new(rows).with(Style::rounded()).to_string());
    out.push('\n');

    for pod in report.pods.iter().filter(|p| p.error.is_some()) {
        if let Some(error) = &pod.error {
            out.push_str(&format!(
                "{} {}: {}\n",
                "⚠".yellow().bold(),
                pod.pod_name,
                error.message
            ));
        }
    }

    match report.aggregate_average {
        Some(average) => out.push_str(&format!("Average throttling: {:.2}%\n", average)),
        None => out.push_str(&format!("Average throttling: {}\n", "n/a (no measured pods)".yellow())),
    }

    out
}

fn format_mode(mode: &MeasurementMode) -> String {
    match mode {
        MeasurementMode::Instantaneous => "instantaneous".to_string(),
        MeasurementMode::Differential { wait_seconds } => format!("differential ({}s)", wait_seconds),
    }
}

/// Color a throttling percentage by severity
pub fn color_percentage(percentage: f64, sample: SampleQuality) -> String {
    let formatted = format!("{:.2}%", percentage);
    match sample {
        SampleQuality::NoData | SampleQuality::ZeroActivity => formatted.dimmed().to_string(),
        SampleQuality::Measured if percentage >= 25.0 => formatted.red().to_string(),
        SampleQuality::Measured if percentage >= 5.0 => formatted.yellow().to_string(),
        SampleQuality::Measured => formatted.green().to_string(),
    }
}

fn color_sample(sample: SampleQuality) -> String {
    match sample {
        SampleQuality::Measured => "measured".to_string(),
        SampleQuality::ZeroActivity => "zero activity".yellow().to_string(),
        SampleQuality::NoData => "no data".red().to_string(),
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use throttle_lib::FailurePolicy;

    fn pod(sample: SampleQuality, percentage: f64) -> PodReport {
        PodReport {
            namespace: "prod".to_string(),
            pod_name: "web-0".to_string(),
            container_name: "app".to_string(),
            throttling_percentage: percentage,
            throttled_rate: 0.000025,
            nr_periods: 150,
            nr_throttled: 10,
            throttled_time: 0,
            cgroup_path: "/sys/fs/cgroup/cpu.stat".to_string(),
            sample,
            periods_delta: Some(50),
            throttled_delta: Some(0),
            throttled_time_delta: Some(0),
            error: None,
        }
    }

    #[test]
    fn test_json_output_contains_contract_fields() {
        let mut report = FleetReport::empty(FailurePolicy::SkipAndZero, None);
        report.pods.push(pod(SampleQuality::Measured, 0.0));

        let json = render_report(&report, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let first = &value["pods"][0];

        for field in [
            "pod_name",
            "throttling_percentage",
            "throttled_rate",
            "nr_periods",
            "nr_throttled",
            "cgroup_path",
            "periods_delta",
            "throttled_delta",
        ] {
            assert!(first.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(value["status"], "success");
    }

    #[test]
    fn test_table_output_lists_pods() {
        colored::control::set_override(false);
        let mut report = FleetReport::empty(FailurePolicy::FailFast, None);
        report.pods.push(pod(SampleQuality::Measured, 12.5));
        report.aggregate_average = Some(12.5);

        let table = render_report(&report, OutputFormat::Table).unwrap();
        assert!(table.contains("web-0"));
        assert!(table.contains("150 (+50)"));
        assert!(table.contains("12.50%"));
        assert!(table.contains("Average throttling: 12.50%"));
        assert!(table.contains("fail-fast"));
    }

    #[test]
    fn test_table_output_without_pods() {
        colored::control::set_override(false);
        let report = FleetReport::empty(FailurePolicy::SkipAndZero, None);
        let table = render_report(&report, OutputFormat::Table).unwrap();
        assert!(table.contains("No pods found matching the criteria"));
        assert!(table.contains("No pods measured"));
    }
}
