//! Command execution inside pods via the exec subresource

use crate::error::{ExecError, ExecErrorKind};
use crate::models::Target;
use crate::remote::{async_trait, RemoteExecutor};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, AttachParams};
use kube::Client;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Runs commands in containers through the Kubernetes API
#[derive(Clone)]
pub struct KubeExecutor {
    client: Client,
}

impl KubeExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteExecutor for KubeExecutor {
    async fn execute(&self, target: &Target, command: &[String]) -> Result<String, ExecError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let params = AttachParams::default()
            .container(target.container_name.clone())
            .stdin(false)
            .stdout(true)
            .stderr(true);

        let mut process = pods
            .exec(&target.pod_name, command.to_vec(), &params)
            .await
            .map_err(classify_kube_error)?;

        let stdout = process.stdout();
        let stderr = process.stderr();
        let status = process.take_status();

        let (stdout, stderr) = tokio::join!(read_all(stdout), read_all(stderr));
        let stdout = stdout?;
        let stderr = stderr?;

        let status = match status {
            Some(status) => status.await,
            None => None,
        };

        process
            .join()
            .await
            .map_err(|e| ExecError::transport(format!("exec stream failed: {}", e)))?;

        if let Some(status) = status {
            if status.status.as_deref() == Some("Failure") {
                let message = status.message.unwrap_or_default();
                return Err(ExecError::transport(format!(
                    "command failed: {} {}",
                    message,
                    stderr.trim()
                )));
            }
        }

        if !stderr.trim().is_empty() {
            debug!(pod = %target, stderr = %stderr.trim(), "Command wrote to stderr");
        }

        Ok(stdout)
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> Result<String, ExecError> {
    let mut buffer = String::new();
    if let Some(mut reader) = reader {
        reader
            .read_to_string(&mut buffer)
            .await
            .map_err(|e| ExecError::transport(format!("failed to read exec output: {}", e)))?;
    }
    Ok(buffer)
}

fn classify_kube_error(error: kube::Error) -> ExecError {
    match &error {
        kube::Error::Api(response) => {
            ExecError::new(classify_api_error(response.code, &response.message), response.message.clone())
        }
        _ => ExecError::transport(error.to_string()),
    }
}

/// Map an API server rejection of an exec request to a failure kind
pub fn classify_api_error(code: u16, message: &str) -> ExecErrorKind {
    let message = message.to_ascii_lowercase();
    let mentions_container = message.contains("container");

    match code {
        401 | 403 => ExecErrorKind::PermissionDenied,
        404 if mentions_container => ExecErrorKind::ContainerNotFound,
        404 => ExecErrorKind::PodNotFound,
        400 if mentions_container
            && (message.contains("not found") || message.contains("not valid")) =>
        {
            ExecErrorKind::ContainerNotFound
        }
        400 if message.contains("waiting")
            || message.contains("not running")
            || message.contains("creating")
            || message.contains("completed pod") =>
        {
            ExecErrorKind::ContainerNotReady
        }
        _ => ExecErrorKind::TransportError,
    }
}
