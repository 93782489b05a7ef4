//! In-process workload provider.
//!
//! Keeps workloads in memory and mimics how the agent-sandbox controller
//! stamps them: a creation timestamp and a `Ready` condition on create, a
//! terminal condition when a retained sandbox is shut down. Used by the
//! `check` and `render` commands and by tests; never talks to a cluster.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::manifest::format_timestamp;
use super::provider::{
    ProviderFactory, ProviderSettings, ProviderStatus, WorkloadProvider, SANDBOX_ID_LABEL,
};
use super::workload;
use crate::config::ShutdownPolicy;
use crate::error::{Result, SandboxError};
use crate::template::{map_of, Mapping, TemplateManager, Value};

/// Workload provider backed by an in-memory map keyed by sandbox id.
#[derive(Debug, Default)]
pub(crate) struct InMemoryProvider {
    shutdown_policy: ShutdownPolicy,
    workloads: RwLock<BTreeMap<String, Mapping>>,
}

impl InMemoryProvider {
    pub fn new(shutdown_policy: ShutdownPolicy) -> Self {
        Self {
            shutdown_policy,
            workloads: RwLock::new(BTreeMap::new()),
        }
    }

    /// Factory that builds an in-memory provider honoring the configured policy.
    pub fn factory() -> InMemoryProviderFactory {
        InMemoryProviderFactory
    }

    /// Number of stored workloads, retained ones included.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.workloads.read().await.len()
    }
}

/// Builds [`InMemoryProvider`]s.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InMemoryProviderFactory;

impl ProviderFactory for InMemoryProviderFactory {
    fn build(&self, settings: &ProviderSettings) -> anyhow::Result<Arc<dyn WorkloadProvider>> {
        Ok(Arc::new(InMemoryProvider::new(settings.shutdown_policy)))
    }
}

fn ready_condition(status: &str, reason: &str, message: &str, at: DateTime<Utc>) -> Mapping {
    map_of([(
        "conditions",
        Value::Sequence(vec![Value::Mapping(map_of([
            ("type", Value::from("Ready")),
            ("status", Value::from(status)),
            ("reason", Value::from(reason)),
            ("message", Value::from(message)),
            ("lastTransitionTime", Value::from(format_timestamp(at))),
        ]))]),
    )])
}

#[async_trait]
impl WorkloadProvider for InMemoryProvider {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn get_expiration(&self, workload: &Mapping) -> Option<DateTime<Utc>> {
        workload::expiration_from_shutdown_time(workload)
    }

    fn get_status(&self, workload: &Mapping) -> ProviderStatus {
        workload::status_from_conditions(workload)
    }

    async fn create(&self, id: &str, manifest: Mapping) -> Result<Mapping> {
        if workload::sandbox_id(&manifest) != Some(id) {
            return Err(SandboxError::provider(format!(
                "workload for {id} does not carry a matching '{SANDBOX_ID_LABEL}' label"
            )));
        }

        let mut workloads = self.workloads.write().await;
        if workloads.contains_key(id) {
            return Err(SandboxError::already_exists(id));
        }

        let now = Utc::now();
        let stamped = map_of([
            (
                "metadata",
                Value::Mapping(map_of([(
                    "creationTimestamp",
                    Value::from(format_timestamp(now)),
                )])),
            ),
            (
                "status",
                Value::Mapping(ready_condition("True", "SandboxReady", "Sandbox is ready", now)),
            ),
        ]);
        let workload = TemplateManager::deep_merge(&manifest, &stamped);

        workloads.insert(id.to_string(), workload.clone());
        debug!(sandbox_id = %id, "Stored workload");
        Ok(workload)
    }

    async fn get(&self, id: &str) -> Result<Option<Mapping>> {
        Ok(self.workloads.read().await.get(id).cloned())
    }

    async fn list(&self, selector: &BTreeMap<String, String>) -> Result<Vec<Mapping>> {
        Ok(self
            .workloads
            .read()
            .await
            .values()
            .filter(|w| workload::matches_selector(w, selector))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut workloads = self.workloads.write().await;

        match self.shutdown_policy {
            ShutdownPolicy::Delete => {
                workloads
                    .remove(id)
                    .ok_or_else(|| SandboxError::not_found(id))?;
                debug!(sandbox_id = %id, "Removed workload");
            }
            ShutdownPolicy::Retain => {
                let stored = workloads
                    .get_mut(id)
                    .ok_or_else(|| SandboxError::not_found(id))?;
                let terminated = map_of([(
                    "status",
                    Value::Mapping(ready_condition(
                        "False",
                        "Terminated",
                        "Sandbox retained after shutdown",
                        Utc::now(),
                    )),
                )]);
                *stored = TemplateManager::deep_merge(stored, &terminated);
                debug!(sandbox_id = %id, "Retained terminated workload");
            }
        }
        Ok(())
    }

    async fn patch(&self, id: &str, patch: Mapping) -> Result<Mapping> {
        let mut workloads = self.workloads.write().await;
        let stored = workloads
            .get_mut(id)
            .ok_or_else(|| SandboxError::not_found(id))?;
        *stored = TemplateManager::deep_merge(stored, &patch);
        Ok(stored.clone())
    }
}
