//! Workload provider contract.
//!
//! The service talks to the orchestration platform only through
//! [`WorkloadProvider`]. Concrete implementations own their client and
//! connection state; they are built by a [`ProviderFactory`] from the
//! validated [`ProviderSettings`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::SandboxState;
use crate::config::{ExecdMode, ShutdownPolicy};
use crate::error::Result;
use crate::template::{Mapping, TemplateManager};

/// Label carrying the sandbox id on every workload.
pub(crate) const SANDBOX_ID_LABEL: &str = "opensandbox.io/id";

/// Status as reported by a provider, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProviderStatus {
    /// Free-form state; normalized against [`SandboxState`] by the service.
    pub state: String,
    pub reason: String,
    pub message: String,
    pub last_transition_at: Option<DateTime<Utc>>,
}

impl ProviderStatus {
    /// Status for a workload that reports nothing usable.
    pub fn unknown() -> Self {
        Self {
            state: SandboxState::Unknown.to_string(),
            reason: String::new(),
            message: String::new(),
            last_transition_at: None,
        }
    }
}

/// Translates sandbox lifecycle operations into platform resource operations.
#[async_trait]
pub(crate) trait WorkloadProvider: Send + Sync {
    /// Returns the provider name for display.
    fn name(&self) -> &'static str;

    /// Expiration of a workload, read from the snapshot alone.
    fn get_expiration(&self, workload: &Mapping) -> Option<DateTime<Utc>>;

    /// Current status of a workload. Never fails.
    fn get_status(&self, workload: &Mapping) -> ProviderStatus;

    /// Creates the workload, failing with `AlreadyExists` on id collision.
    async fn create(&self, id: &str, manifest: Mapping) -> Result<Mapping>;

    async fn get(&self, id: &str) -> Result<Option<Mapping>>;

    /// Workloads whose labels contain every selector pair.
    async fn list(&self, selector: &BTreeMap<String, String>) -> Result<Vec<Mapping>>;

    /// Deletes the workload according to the configured shutdown policy.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Deep-merges `patch` into the stored workload and returns the result.
    async fn patch(&self, id: &str, patch: Mapping) -> Result<Mapping>;
}

/// Everything a provider needs to talk to the cluster and shape workloads.
#[derive(Debug, Clone)]
pub(crate) struct ProviderSettings {
    pub kubeconfig_path: Option<PathBuf>,
    pub namespace: String,
    pub service_account: Option<String>,
    pub template_file_path: Option<PathBuf>,
    pub templates: Arc<TemplateManager>,
    pub execd_mode: ExecdMode,
    pub execd_image: String,
    pub shutdown_policy: ShutdownPolicy,
    pub ingress_enabled: bool,
}

/// Builds a provider (and its platform client) from settings.
pub(crate) trait ProviderFactory: Send + Sync {
    fn build(&self, settings: &ProviderSettings) -> anyhow::Result<Arc<dyn WorkloadProvider>>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&ProviderSettings) -> anyhow::Result<Arc<dyn WorkloadProvider>> + Send + Sync,
{
    fn build(&self, settings: &ProviderSettings) -> anyhow::Result<Arc<dyn WorkloadProvider>> {
        self(settings)
    }
}
