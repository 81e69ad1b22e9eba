//! Pod discovery by namespace and label selector

use crate::models::Target;
use crate::remote::{async_trait, TargetLister};
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::{debug, warn};

/// Lists measurement targets from the Kubernetes API
#[derive(Clone)]
pub struct KubePodLister {
    client: Client,
}

impl KubePodLister {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Turn a pod into a target, choosing the container to measure
///
/// Returns `None` for pods without a name or without any container to pick.
pub fn target_for_pod(namespace: &str, pod: &Pod, container: Option<&str>) -> Option<Target> {
    let pod_name = pod.metadata.name.clone()?;
    let container_name = match container {
        Some(name) => name.to_string(),
        None => pod.spec.as_ref()?.containers.first()?.name.clone(),
    };
    let namespace = pod
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| namespace.to_string());

    Some(Target::new(namespace, pod_name, container_name))
}

#[async_trait]
impl TargetLister for KubePodLister {
    async fn list_targets(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
        container: Option<&str>,
    ) -> Result<Vec<Target>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);

        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        let pod_list = pods
            .list(&params)
            .await
            .with_context(|| format!("Failed to list pods in namespace '{}'", namespace))?;

        let mut targets = Vec::with_capacity(pod_list.items.len());
        for pod in &pod_list.items {
            match target_for_pod(namespace, pod, container) {
                Some(target) => targets.push(target),
                None => warn!(
                    namespace = %namespace,
                    pod_name = ?pod.metadata.name,
                    "Skipping pod without a name or container"
                ),
            }
        }

        debug!(
            namespace = %namespace,
            label_selector = ?label_selector,
            pods = targets.len(),
            "Found pods matching label selector"
        );

        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const POD_LIST: &str = r#"{
        "kind": "PodList",
        "apiVersion": "v1",
        "metadata": {"resourceVersion": "1"},
        "items": [
            {
                "metadata": {"name": "web-b", "namespace": "prod"},
                "spec": {"containers": [{"name": "app"}, {"name": "sidecar"}]}
            },
            {
                "metadata": {"name": "web-a", "namespace": "prod"},
                "spec": {"containers": [{"name": "app"}]}
            },
            {
                "metadata": {"namespace": "prod"},
                "spec": {"containers": [{"name": "app"}]}
            }
        ]
    }"#;

    fn pods() -> Vec<Pod> {
        let list: serde_json::Value = serde_json::from_str(POD_LIST).unwrap();
        serde_json::from_value(list["items"].clone()).unwrap()
    }

    #[test]
    fn test_target_defaults_to_first_container() {
        let pods = pods();
        let target = target_for_pod("prod", &pods[0], None).unwrap();
        assert_eq!(target, Target::new("prod", "web-b", "app"));
    }

    #[test]
    fn test_target_uses_configured_container() {
        let pods = pods();
        let target = target_for_pod("prod", &pods[0], Some("sidecar")).unwrap();
        assert_eq!(target.container_name, "sidecar");
    }

    #[test]
    fn test_unnamed_pod_is_skipped() {
        let pods = pods();
        assert_eq!(target_for_pod("prod", &pods[2], None), None);
    }

    async fn lister_for(server: &mockito::ServerGuard) -> KubePodLister {
        let config = kube::Config::new(server.url().parse().unwrap());
        KubePodLister::new(Client::try_from(config).unwrap())
    }

    #[tokio::test]
    async fn test_list_targets_keeps_api_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/namespaces/prod/pods")
            .match_query(Matcher::UrlEncoded("labelSelector".into(), "app=web".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(POD_LIST)
            .create_async()
            .await;

        let lister = lister_for(&server).await;
        let targets = lister.list_targets("prod", Some("app=web"), None).await.unwrap();

        mock.assert_async().await;
        let names: Vec<&str> = targets.iter().map(|t| t.pod_name.as_str()).collect();
        assert_eq!(names, vec!["web-b", "web-a"]);
    }

    #[tokio::test]
    async fn test_list_targets_propagates_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/namespaces/prod/pods")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"pods is forbidden","reason":"Forbidden","code":403}"#,
            )
            .create_async()
            .await;

        let lister = lister_for(&server).await;
        let err = lister.list_targets("prod", None, None).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to list pods in namespace 'prod'"));
    }
}
