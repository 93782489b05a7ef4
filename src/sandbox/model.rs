//! Domain model for sandboxes as seen by API clients.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Lifecycle state of a sandbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub(crate) enum SandboxState {
    Pending,
    Running,
    Terminating,
    Terminated,
    Error,
    #[default]
    Unknown,
}

impl SandboxState {
    /// Parses a provider-reported state, mapping anything unrecognized to `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "terminating" => Self::Terminating,
            "terminated" => Self::Terminated,
            "error" | "failed" => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Terminating => "Terminating",
            Self::Terminated => "Terminated",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }

    /// Returns true once the sandbox can no longer run.
    #[allow(dead_code)] // Public API for callers
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Error)
    }
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SandboxStatus {
    pub state: SandboxState,
    pub reason: String,
    pub message: String,
    pub last_transition_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ImageSpec {
    pub uri: String,
}

/// A sandbox, rebuilt from a fresh workload snapshot on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Sandbox {
    pub id: String,
    pub image: ImageSpec,
    pub entrypoint: Vec<String>,
    /// User labels; never contains the reserved id label.
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: SandboxStatus,
}

/// Parameters for creating a sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CreateSandboxRequest {
    /// Explicit id; a UUID is generated when unset.
    pub id: Option<String>,
    pub image: String,
    pub entrypoint: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
    /// Kubernetes resource limits, e.g. `cpu = "1"`, `memory = "2Gi"`.
    pub resource_limits: BTreeMap<String, String>,
    /// Lifetime after which the sandbox is shut down.
    pub timeout: Option<Duration>,
}

impl CreateSandboxRequest {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }
}
