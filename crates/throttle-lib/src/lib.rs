//! CPU throttling measurement library
//!
//! This crate provides the core functionality for:
//! - Locating and reading cgroup cpu.stat inside running containers
//! - Parsing cgroup v1 and v2 counter formats
//! - Instantaneous and differential throttling computation
//! - Fleet-wide runs with an explicit partial-failure policy
//! - Kubernetes exec and pod discovery
//! - Structured logging and Prometheus export

pub mod calculator;
pub mod cluster;
pub mod collector;
pub mod error;
pub mod fleet;
pub mod models;
pub mod observability;
pub mod remote;

pub use error::{ExecError, ExecErrorKind, ParseError, ThrottleError};
pub use fleet::{FleetAggregator, FleetReport, MeasurementMode, PodReport, RunStatus, Summary};
pub use models::*;
pub use observability::{RunLogger, ThrottleMetrics};
pub use remote::{RemoteExecutor, TargetLister};
