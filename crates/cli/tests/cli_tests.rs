//! CLI integration tests

use std::process::{Command, Output};

const ENV_VARS: &[&str] = &[
    "NAMESPACE",
    "CONTAINER_NAME",
    "LABEL_SELECTOR",
    "CGROUP_PATH",
    "COMPLETE_CGROUP_PATH",
    "WAIT_SECONDS",
    "FAILURE_POLICY",
    "OUTPUT_FORMAT",
    "METRICS_FILE",
    "VERBOSE",
    "KUBECONFIG",
    "KUBERNETES_SERVICE_HOST",
    "KUBERNETES_SERVICE_PORT",
];

/// Kubeconfig split across two files, pointing at a port nothing listens on
const KUBECONFIG_CLUSTER: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: local
  cluster:
    server: http://127.0.0.1:1
contexts:
- name: local
  context:
    cluster: local
    user: tester
current-context: local
"#;

const KUBECONFIG_USER: &str = r#"apiVersion: v1
kind: Config
users:
- name: tester
  user:
    token: test-token
"#;

/// Run the CLI with a clean environment and an empty config file
fn run_cli(args: &[&str], env: &[(&str, &str)]) -> Output {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = dir.path().join("config.json");
    std::fs::write(&config, "{}").expect("Failed to write config");

    let mut command = Command::new("cargo");
    command
        .args(["run", "-q", "-p", "cputhrottle-cli", "--"])
        .arg("--config")
        .arg(&config)
        .args(args);
    for var in ENV_VARS {
        command.env_remove(var);
    }
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "cputhrottle-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("CPU throttling"), "Should describe the tool");
    assert!(stdout.contains("--namespace"), "Should show namespace option");
    assert!(stdout.contains("--container-name"), "Should show container option");
    assert!(stdout.contains("--label-selector"), "Should show selector option");
    assert!(stdout.contains("--cgroup-path"), "Should show base path option");
    assert!(
        stdout.contains("--complete-cgroup-path"),
        "Should show exact path option"
    );
    assert!(stdout.contains("--wait-seconds"), "Should show wait option");
    assert!(stdout.contains("--failure-policy"), "Should show policy option");
    assert!(stdout.contains("--verbose"), "Should show verbose option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "cputhrottle-cli", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("cputhrottle"), "Should show binary name");
}

/// Missing namespace fails before any cluster call
#[test]
fn test_missing_namespace_reports_error() {
    let output = run_cli(&[], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "Should exit non-zero");
    let report: serde_json::Value =
        serde_json::from_str(&stdout).expect("Should print a JSON report");
    assert_eq!(report["status"], "error");
    assert_eq!(report["error"]["kind"], "configuration_error");
    assert!(report["message"].as_str().unwrap().contains("namespace"));
}

/// Both path flags together are rejected
#[test]
fn test_conflicting_path_flags_report_error() {
    let output = run_cli(
        &[
            "--namespace",
            "default",
            "--cgroup-path",
            "/sys/fs/cgroup",
            "--complete-cgroup-path",
            "/sys/fs/cgroup/cpu.stat",
        ],
        &[],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "Should exit non-zero");
    assert!(stdout.contains("mutually exclusive"));
}

/// Both path env vars together are rejected
#[test]
fn test_conflicting_path_env_report_error() {
    let output = run_cli(
        &[],
        &[
            ("NAMESPACE", "default"),
            ("CGROUP_PATH", "/sys/fs/cgroup"),
            ("COMPLETE_CGROUP_PATH", "/sys/fs/cgroup/cpu.stat"),
        ],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "Should exit non-zero");
    assert!(stdout.contains("CGROUP_PATH and COMPLETE_CGROUP_PATH"));
}

/// Negative wait is a configuration error
#[test]
fn test_negative_wait_reports_error() {
    let output = run_cli(&["--namespace", "default", "--wait-seconds=-2"], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "Should exit non-zero");
    assert!(stdout.contains("configuration_error"));
}

/// Parse a JSON report from stdout
fn report(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| {
        panic!(
            "Should print a JSON report ({}); stdout: {} stderr: {}",
            e,
            stdout,
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

/// Unknown failure policy produces a configuration error report
#[test]
fn test_unknown_failure_policy_reports_error() {
    let output = run_cli(&["--namespace", "default", "--failure-policy", "retry"], &[]);

    assert_eq!(output.status.code(), Some(1), "Should exit with a report error");
    let report = report(&output);
    assert_eq!(report["error"]["kind"], "configuration_error");
    assert!(report["message"].as_str().unwrap().contains("unknown failure policy"));
}

/// Bad env values for typed settings still produce a report
#[test]
fn test_bad_env_values_report_error() {
    for (key, value, needle) in [
        ("WAIT_SECONDS", "soon", "wait seconds"),
        ("FAILURE_POLICY", "retry", "unknown failure policy"),
    ] {
        let output = run_cli(&[], &[("NAMESPACE", "default"), (key, value)]);

        assert_eq!(output.status.code(), Some(1), "{} should not abort parsing", key);
        let report = report(&output);
        assert_eq!(report["error"]["kind"], "configuration_error");
        assert!(report["message"].as_str().unwrap().contains(needle));
    }
}

/// Numeric and word forms of VERBOSE are accepted
#[test]
fn test_verbose_env_accepts_common_forms() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let missing = dir.path().join("missing-kubeconfig");
    let missing = missing.to_str().unwrap();

    for value in ["1", "yes", "on", "0", "false"] {
        let output = run_cli(
            &["--namespace", "default", "--kubeconfig", missing],
            &[("VERBOSE", value)],
        );
        let stderr = String::from_utf8_lossy(&output.stderr);

        assert!(!stderr.contains("invalid value"), "VERBOSE={} rejected: {}", value, stderr);
        let report = report(&output);
        assert_eq!(report["status"], "error");
        assert_eq!(report["error"]["kind"], "configuration_error");
        assert!(report["message"].as_str().unwrap().contains("missing-kubeconfig"));
    }
}

/// A KUBECONFIG list is merged by the client instead of read as one path
#[test]
fn test_kubeconfig_env_list_is_merged() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let cluster = dir.path().join("cluster.yaml");
    let user = dir.path().join("user.yaml");
    std::fs::write(&cluster, KUBECONFIG_CLUSTER).expect("Failed to write kubeconfig");
    std::fs::write(&user, KUBECONFIG_USER).expect("Failed to write kubeconfig");
    let list = format!("{}:{}", cluster.display(), user.display());

    let output = run_cli(&["--namespace", "default"], &[("KUBECONFIG", &list)]);

    assert_eq!(output.status.code(), Some(1));
    let report = report(&output);
    // Configuration loaded from both files; only the API call fails
    assert_eq!(report["error"]["kind"], "discovery_error");
}
