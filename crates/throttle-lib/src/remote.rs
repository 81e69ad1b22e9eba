//! Seams to the cluster: command execution inside containers and pod discovery

use crate::error::ExecError;
use crate::models::Target;
use anyhow::Result;

pub use async_trait::async_trait;

/// Runs a command inside a container and returns its standard output
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, target: &Target, command: &[String]) -> Result<String, ExecError>;
}

/// Produces the measurement targets for a run
#[async_trait]
pub trait TargetLister: Send + Sync {
    /// List targets in discovery order
    ///
    /// `container` selects the container to measure in every pod; when absent
    /// the pod's first declared container is used.
    async fn list_targets(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
        container: Option<&str>,
    ) -> Result<Vec<Target>>;
}

/// Wrap a script for `sh -c`
pub fn shell_command(script: impl Into<String>) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.into()]
}
