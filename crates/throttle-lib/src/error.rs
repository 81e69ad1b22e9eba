//! Error taxonomy for throttling measurement

use crate::models::Target;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Classification of a remote command failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecErrorKind {
    PodNotFound,
    ContainerNotFound,
    ContainerNotReady,
    PermissionDenied,
    TransportError,
}

impl fmt::Display for ExecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecErrorKind::PodNotFound => "pod not found",
            ExecErrorKind::ContainerNotFound => "container not found",
            ExecErrorKind::ContainerNotReady => "container not ready",
            ExecErrorKind::PermissionDenied => "permission denied",
            ExecErrorKind::TransportError => "transport error",
        };
        f.write_str(label)
    }
}

/// Failure reported by the remote command capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct ExecError {
    pub kind: ExecErrorKind,
    pub detail: String,
}

impl ExecError {
    pub fn new(kind: ExecErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(ExecErrorKind::TransportError, detail)
    }
}

/// cpu.stat content that could not be turned into counters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("{key} appears twice with different values ({first} and {second})")]
    ConflictingValues {
        key: String,
        first: u64,
        second: u64,
    },

    #[error("no statistics present")]
    NoStatistics,
}

/// Errors surfaced by the measurement engine
#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to list pods: {0}")]
    Discovery(String),

    #[error("remote command in {target} failed while probing {attempted}: {source}")]
    RemoteExecution {
        target: Target,
        attempted: String,
        #[source]
        source: ExecError,
    },

    #[error("no cpu.stat found in {target} (tried {})", .attempted.join(", "))]
    StatsNotFound {
        target: Target,
        attempted: Vec<String>,
    },

    #[error("could not parse {path} in {target}: {source}")]
    Parse {
        target: Target,
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("{counter} went backwards in {path} of {target} ({before} -> {after}); container restarted?")]
    CounterRegression {
        target: Target,
        path: String,
        counter: &'static str,
        before: u64,
        after: u64,
    },
}

impl ThrottleError {
    /// Stable label for reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ThrottleError::Configuration(_) => "configuration_error",
            ThrottleError::Discovery(_) => "discovery_error",
            ThrottleError::RemoteExecution { .. } => "remote_execution_error",
            ThrottleError::StatsNotFound { .. } => "stats_not_found",
            ThrottleError::Parse { .. } => "parse_error",
            ThrottleError::CounterRegression { .. } => "counter_regression",
        }
    }

    /// Remote classification, when the failure came from the capability
    pub fn exec_kind(&self) -> Option<ExecErrorKind> {
        match self {
            ThrottleError::RemoteExecution { source, .. } => Some(source.kind),
            _ => None,
        }
    }
}

pub type Result<T, E = ThrottleError> = std::result::Result<T, E>;
