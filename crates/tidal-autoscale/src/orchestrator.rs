//! Orchestrator capability: read and set a workload's replica count.
//!
//! [`KubeOrchestrator`] implements it on the `scale` subresource of an
//! `apps/v1` Deployment. "Set replicas to N" is idempotent, so repeating a
//! command after an ambiguous failure is safe.

use std::future::Future;
use std::pin::Pin;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v1::ScaleStatus;
use kube::Client;
use kube::api::{Api, Patch, PatchParams};
use tracing::{debug, info};

use crate::error::{AutoscaleError, AutoscaleResult};

/// Boxed future returned by orchestrator calls.
pub type OrchestratorFuture<'a, T> = Pin<Box<dyn Future<Output = AutoscaleResult<T>> + Send + 'a>>;

/// Replica control for one named workload.
pub trait Orchestrator: Send + Sync {
    /// Replica count currently reported for the workload.
    fn current_replicas(&self) -> OrchestratorFuture<'_, u32>;

    /// Set the desired replica count. Callers clamp `replicas` to the fleet
    /// bounds before invoking this.
    fn set_replicas(&self, replicas: u32) -> OrchestratorFuture<'_, ()>;
}

/// Scales a Kubernetes Deployment.
pub struct KubeOrchestrator {
    api: Api<Deployment>,
    workload: String,
    namespace: String,
    /// Reported when the scale subresource has no count, or a count of zero.
    min_replicas: u32,
}

impl KubeOrchestrator {
    /// Connect using in-cluster configuration, falling back to the local
    /// kubeconfig.
    pub async fn connect(workload: &str, namespace: &str) -> AutoscaleResult<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| AutoscaleError::remote("kubernetes connect", e))?;
        info!(%workload, %namespace, "kubernetes client ready");
        Ok(Self::new(client, workload, namespace))
    }

    pub fn new(client: Client, workload: &str, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            workload: workload.to_string(),
            namespace: namespace.to_string(),
            min_replicas: 1,
        }
    }

    pub fn with_min_replicas(mut self, min_replicas: u32) -> Self {
        self.min_replicas = min_replicas;
        self
    }
}

/// Replica count from a scale status. A missing status or a count of zero
/// (a deployment still rolling out, or scaled to nothing) reads as the floor.
fn replicas_from_status(status: Option<&ScaleStatus>, floor: u32) -> u32 {
    match status.map(|s| s.replicas) {
        Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => floor,
    }
}

impl Orchestrator for KubeOrchestrator {
    fn current_replicas(&self) -> OrchestratorFuture<'_, u32> {
        Box::pin(async move {
            let scale = self
                .api
                .get_scale(&self.workload)
                .await
                .map_err(|e| AutoscaleError::remote("read replicas", e))?;
            let replicas = replicas_from_status(scale.status.as_ref(), self.min_replicas);
            debug!(
                workload = %self.workload,
                namespace = %self.namespace,
                replicas,
                "read current replicas"
            );
            Ok(replicas)
        })
    }

    fn set_replicas(&self, replicas: u32) -> OrchestratorFuture<'_, ()> {
        Box::pin(async move {
            let patch = serde_json::json!({ "spec": { "replicas": replicas } });
            self.api
                .patch_scale(&self.workload, &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .map_err(|e| AutoscaleError::ScaleCommandFailed(e.to_string()))?;
            info!(
                workload = %self.workload,
                namespace = %self.namespace,
                replicas,
                "deployment scaled"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(replicas: i32) -> ScaleStatus {
        ScaleStatus {
            replicas,
            ..ScaleStatus::default()
        }
    }

    #[test]
    fn reported_count_is_used() {
        assert_eq!(replicas_from_status(Some(&status(4)), 1), 4);
    }

    #[test]
    fn zero_or_missing_count_reads_as_floor() {
        assert_eq!(replicas_from_status(Some(&status(0)), 2), 2);
        assert_eq!(replicas_from_status(Some(&status(-1)), 2), 2);
        assert_eq!(replicas_from_status(None, 3), 3);
    }
}
