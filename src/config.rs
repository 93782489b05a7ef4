use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub(crate) const CONFIG_FILE: &str = "opensandbox.toml";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Required when `runtime.type = "agent-sandbox"`
    #[serde(default)]
    pub kubernetes: Option<KubernetesRuntimeConfig>,
    #[serde(default)]
    pub agent_sandbox: Option<AgentSandboxRuntimeConfig>,
    /// Directory of the loaded file; relative paths inside it resolve here
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// API server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level used when `--verbose` is not given (e.g. "info", "DEBUG")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// API key clients must present (optional)
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            api_key: None,
        }
    }
}

/// Which runtime backs sandboxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeType {
    #[default]
    Docker,
    AgentSandbox,
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::AgentSandbox => write!(f, "agent-sandbox"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(rename = "type", default)]
    pub runtime_type: RuntimeType,

    /// Image carrying the in-sandbox execution daemon
    #[serde(default = "default_execd_image")]
    pub execd_image: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_type: RuntimeType::default(),
            execd_image: default_execd_image(),
        }
    }
}

/// Kubernetes connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesRuntimeConfig {
    /// Path to a kubeconfig file; in-cluster config is used when unset
    #[serde(default)]
    pub kubeconfig_path: Option<String>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub service_account: Option<String>,

    #[serde(default = "default_workload_provider")]
    pub workload_provider: String,
}

impl Default for KubernetesRuntimeConfig {
    fn default() -> Self {
        Self {
            kubeconfig_path: None,
            namespace: default_namespace(),
            service_account: None,
            workload_provider: default_workload_provider(),
        }
    }
}

/// How execd gets into the sandbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecdMode {
    /// Copied in by an init container
    #[default]
    Init,
    /// Already present in the sandbox image
    Embedded,
}

impl fmt::Display for ExecdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Embedded => write!(f, "embedded"),
        }
    }
}

/// What happens to the underlying resource when a sandbox is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownPolicy {
    #[default]
    Delete,
    Retain,
}

impl fmt::Display for ShutdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => write!(f, "Delete"),
            Self::Retain => write!(f, "Retain"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSandboxRuntimeConfig {
    /// Base workload template (YAML)
    #[serde(default)]
    pub template_file: Option<String>,

    #[serde(default)]
    pub execd_mode: ExecdMode,

    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,

    #[serde(default = "default_true")]
    pub ingress_enabled: bool,
}

impl Default for AgentSandboxRuntimeConfig {
    fn default() -> Self {
        Self {
            template_file: None,
            execd_mode: ExecdMode::default(),
            shutdown_policy: ShutdownPolicy::default(),
            ingress_enabled: true,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_execd_image() -> String {
    "ghcr.io/opensandbox/execd:latest".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_workload_provider() -> String {
    "agent-sandbox".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf);

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Cross-field checks serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.runtime.runtime_type == RuntimeType::AgentSandbox {
            let Some(kubernetes) = &self.kubernetes else {
                bail!("[kubernetes] section is required when runtime.type = 'agent-sandbox'");
            };
            if kubernetes.workload_provider != "agent-sandbox" {
                bail!(
                    "Unsupported kubernetes.workload_provider: '{}'. Supported: agent-sandbox",
                    kubernetes.workload_provider
                );
            }
            if kubernetes.namespace.trim().is_empty() {
                bail!("kubernetes.namespace must not be empty");
            }
        }
        Ok(())
    }

    /// Expands `~` and anchors relative paths at the config file's directory.
    pub fn resolve_path(&self, path: &str) -> Result<PathBuf> {
        let expanded = expand_path(path)?;
        match &self.base_dir {
            Some(base) if expanded.is_relative() => Ok(base.join(expanded)),
            _ => Ok(expanded),
        }
    }

    /// Agent-sandbox settings, falling back to defaults when the section is absent
    pub fn agent_sandbox_or_default(&self) -> AgentSandboxRuntimeConfig {
        self.agent_sandbox.clone().unwrap_or_default()
    }
}

/// Expand ~ to home directory
pub(crate) fn expand_path(path: &str) -> Result<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(path))
    }
}
