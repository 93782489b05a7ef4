//! Agent-sandbox lifecycle service.
//!
//! Validates configuration, constructs the workload provider and maps raw
//! workload snapshots into [`Sandbox`] values. Holds no sandbox state of its
//! own; every read goes to the provider.

use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::manifest::{build_workload_override, format_timestamp, validate_sandbox_id};
use super::provider::{ProviderFactory, ProviderSettings, WorkloadProvider, SANDBOX_ID_LABEL};
use super::workload;
use super::{CreateSandboxRequest, ImageSpec, Sandbox, SandboxState, SandboxStatus};
use crate::config::{
    AgentSandboxRuntimeConfig, AppConfig, ExecdMode, KubernetesRuntimeConfig,
    RuntimeType, ShutdownPolicy,
};
use crate::error::{Result, SandboxError};
use crate::template::{map_of, lookup, Mapping, TemplateManager, Value};

/// Sandbox lifecycle on top of an agent-sandbox workload provider.
pub(crate) struct SandboxService {
    settings: ProviderSettings,
    provider: Arc<dyn WorkloadProvider>,
}

impl std::fmt::Debug for SandboxService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxService")
            .field("settings", &self.settings)
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl SandboxService {
    /// Validates `config` and builds the provider through `factory`.
    ///
    /// Any failure while loading the template or constructing the provider
    /// is reported as `UpstreamUnavailable` (`K8S_INITIALIZATION_ERROR`).
    pub fn new(config: &AppConfig, factory: &dyn ProviderFactory) -> Result<Self> {
        if config.runtime.runtime_type != RuntimeType::AgentSandbox {
            return Err(SandboxError::config(format!(
                "SandboxService requires runtime.type = '{}', got '{}'",
                RuntimeType::AgentSandbox,
                config.runtime.runtime_type
            )));
        }

        let Some(kubernetes) = &config.kubernetes else {
            return Err(SandboxError::upstream_unavailable(
                "Kubernetes configuration is required for runtime.type = 'agent-sandbox'",
            ));
        };

        let agent = config.agent_sandbox_or_default();
        let (settings, provider) =
            init_provider(config, kubernetes, &agent, factory).map_err(|e| {
                warn!(error = %format!("{e:#}"), "Failed to initialize agent-sandbox provider");
                SandboxError::upstream_unavailable(format!("{e:#}"))
            })?;

        info!(
            namespace = %settings.namespace,
            provider = provider.name(),
            execd_mode = %settings.execd_mode,
            shutdown_policy = %settings.shutdown_policy,
            "Initialized agent-sandbox service"
        );

        Ok(Self { settings, provider })
    }

    pub fn namespace(&self) -> &str {
        &self.settings.namespace
    }

    pub fn execd_image(&self) -> &str {
        &self.settings.execd_image
    }

    pub fn execd_mode(&self) -> ExecdMode {
        self.settings.execd_mode
    }

    pub fn shutdown_policy(&self) -> ShutdownPolicy {
        self.settings.shutdown_policy
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn templates(&self) -> &TemplateManager {
        &self.settings.templates
    }

    /// Merges the request override over the base template without creating anything.
    pub fn render_workload(
        &self,
        id: &str,
        request: &CreateSandboxRequest,
        now: DateTime<Utc>,
    ) -> Result<Mapping> {
        validate_sandbox_id(id)?;
        let override_ = build_workload_override(request, id, &self.settings, now)?;
        let base = self.settings.templates.get_base_template();
        Ok(TemplateManager::deep_merge(&base, &override_))
    }

    pub async fn create_sandbox(&self, request: CreateSandboxRequest) -> Result<Sandbox> {
        let id = request
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let manifest = self.render_workload(&id, &request, Utc::now())?;

        debug!(sandbox_id = %id, image = %request.image, "Creating sandbox");
        let workload = self.provider.create(&id, manifest).await?;
        let sandbox = self.build_sandbox_from_workload(&workload)?;
        info!(sandbox_id = %sandbox.id, state = %sandbox.status.state, "Sandbox created");
        Ok(sandbox)
    }

    #[allow(dead_code)] // Public API for callers
    pub async fn get_sandbox(&self, id: &str) -> Result<Sandbox> {
        let workload = self
            .provider
            .get(id)
            .await?
            .ok_or_else(|| SandboxError::not_found(id))?;
        self.build_sandbox_from_workload(&workload)
    }

    /// Sandboxes whose metadata contains every `filter` pair.
    ///
    /// Workloads that cannot be mapped are skipped with a warning.
    #[allow(dead_code)] // Public API for callers
    pub async fn list_sandboxes(&self, filter: &BTreeMap<String, String>) -> Result<Vec<Sandbox>> {
        let workloads = self.provider.list(filter).await?;
        let total = workloads.len();

        let sandboxes: Vec<Sandbox> = workloads
            .iter()
            .filter_map(|w| match self.build_sandbox_from_workload(w) {
                Ok(sandbox) => Some(sandbox),
                Err(e) => {
                    warn!(error = %e, "Skipping workload");
                    None
                }
            })
            .collect();

        debug!(total, returned = sandboxes.len(), "Listed sandboxes");
        Ok(sandboxes)
    }

    #[allow(dead_code)] // Public API for callers
    pub async fn delete_sandbox(&self, id: &str) -> Result<()> {
        self.provider.delete(id).await?;
        info!(
            sandbox_id = %id,
            shutdown_policy = %self.settings.shutdown_policy,
            "Sandbox deleted"
        );
        Ok(())
    }

    /// Moves the sandbox shutdown time to `expires_at`.
    #[allow(dead_code)] // Public API for callers
    pub async fn renew_expiration(&self, id: &str, expires_at: DateTime<Utc>) -> Result<Sandbox> {
        if expires_at <= Utc::now() {
            return Err(SandboxError::config(format!(
                "New expiration {} is in the past",
                format_timestamp(expires_at)
            )));
        }

        let patch = map_of([(
            "spec",
            Value::Mapping(map_of([(
                "shutdownTime",
                Value::from(format_timestamp(expires_at)),
            )])),
        )]);
        let workload = self.provider.patch(id, patch).await?;
        debug!(sandbox_id = %id, expires_at = %expires_at, "Renewed sandbox expiration");
        self.build_sandbox_from_workload(&workload)
    }

    /// Maps a raw workload snapshot into the domain model.
    pub fn build_sandbox_from_workload(&self, workload: &Mapping) -> Result<Sandbox> {
        let id = workload::sandbox_id(workload)
            .ok_or_else(|| {
                SandboxError::malformed_workload(format!("missing label '{SANDBOX_ID_LABEL}'"))
            })?
            .to_string();

        let container = workload::main_container(workload).ok_or_else(|| {
            SandboxError::malformed_workload(format!("workload {id} has no containers"))
        })?;
        let image = container
            .get("image")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SandboxError::malformed_workload(format!("workload {id} has no container image"))
            })?
            .to_string();
        let entrypoint = container
            .get("command")
            .and_then(Value::as_sequence)
            .map(|args| args.iter().filter_map(Value::to_scalar_string).collect())
            .unwrap_or_default();

        let mut metadata = workload::labels(workload);
        metadata.remove(SANDBOX_ID_LABEL);

        let created_at = workload::creation_timestamp(workload).ok_or_else(|| {
            let raw = lookup(workload, &["metadata", "creationTimestamp"]);
            SandboxError::malformed_workload(format!(
                "workload {id} has invalid creationTimestamp: {raw:?}"
            ))
        })?;

        let reported = self.provider.get_status(workload);
        let state = SandboxState::parse_lenient(&reported.state);
        if state == SandboxState::Unknown && !reported.state.eq_ignore_ascii_case("unknown") {
            debug!(sandbox_id = %id, state = %reported.state, "Unrecognized sandbox state");
        }

        Ok(Sandbox {
            id,
            image: ImageSpec { uri: image },
            entrypoint,
            metadata,
            created_at,
            expires_at: self.provider.get_expiration(workload),
            status: SandboxStatus {
                state,
                reason: reported.reason,
                message: reported.message,
                last_transition_at: reported.last_transition_at.unwrap_or(created_at),
            },
        })
    }
}

fn init_provider(
    config: &AppConfig,
    kubernetes: &KubernetesRuntimeConfig,
    agent: &AgentSandboxRuntimeConfig,
    factory: &dyn ProviderFactory,
) -> anyhow::Result<(ProviderSettings, Arc<dyn WorkloadProvider>)> {
    let template_file_path = agent
        .template_file
        .as_deref()
        .map(|p| config.resolve_path(p))
        .transpose()?;
    let templates = TemplateManager::new(template_file_path.as_deref())
        .context("Failed to load sandbox template")?;
    let kubeconfig_path = kubernetes
        .kubeconfig_path
        .as_deref()
        .map(|p| config.resolve_path(p))
        .transpose()?;

    let settings = ProviderSettings {
        kubeconfig_path,
        namespace: kubernetes.namespace.clone(),
        service_account: kubernetes.service_account.clone(),
        template_file_path,
        templates: Arc::new(templates),
        execd_mode: agent.execd_mode,
        execd_image: config.runtime.execd_image.clone(),
        shutdown_policy: agent.shutdown_policy,
        ingress_enabled: agent.ingress_enabled,
    };

    let provider = factory
        .build(&settings)
        .context("Failed to create workload provider")?;
    Ok((settings, provider))
}
