//! Kubernetes-backed collaborators
//!
//! Implements [`RemoteExecutor`](crate::remote::RemoteExecutor) with the pod
//! exec subresource and [`TargetLister`](crate::remote::TargetLister) with a
//! label-selected pod list.

mod discovery;
mod exec;

pub use discovery::KubePodLister;
pub use exec::{classify_api_error, KubeExecutor};

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use tracing::debug;

/// Build a client from an explicit kubeconfig, or infer one
///
/// Inference tries the in-cluster service account first, then the default
/// kubeconfig location.
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client> {
    match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("Failed to load Kubernetes configuration")?;
            debug!(kubeconfig = %path.display(), "Using Kubernetes configuration from file");
            Client::try_from(config).context("Failed to create Kubernetes client")
        }
        None => {
            debug!("Inferring Kubernetes configuration");
            Client::try_default()
                .await
                .context("Failed to load Kubernetes configuration")
        }
    }
}
