//! Per-request workload overrides.
//!
//! Builds the mapping that is deep-merged over the base template to form
//! the final agent-sandbox resource. Only request-specific fields live here;
//! scheduling knobs (node selectors, tolerations, ...) come from the template.

use chrono::{DateTime, SecondsFormat, Utc};

use super::provider::{ProviderSettings, SANDBOX_ID_LABEL};
use super::CreateSandboxRequest;
use crate::config::ExecdMode;
use crate::error::{Result, SandboxError};
use crate::template::{map_of, Mapping, Value};

pub(crate) const API_VERSION: &str = "agents.x-k8s.io/v1alpha1";
pub(crate) const KIND: &str = "Sandbox";

pub(crate) const MAIN_CONTAINER: &str = "sandbox";
const EXECD_INSTALLER: &str = "execd-installer";
const EXECD_VOLUME: &str = "opensandbox-bin";
const EXECD_MOUNT_PATH: &str = "/opt/opensandbox/bin";
const EXECD_BINARY: &str = "/opt/opensandbox/bin/execd";

const INGRESS_ANNOTATION: &str = "opensandbox.io/ingress-enabled";
const EXECD_MODE_ANNOTATION: &str = "opensandbox.io/execd-mode";

/// Maximum length of a Kubernetes object name.
const MAX_NAME_LEN: usize = 63;

/// Checks that `id` is usable as a Kubernetes object name (RFC 1123 label).
pub(crate) fn validate_sandbox_id(id: &str) -> Result<()> {
    let valid_chars = id
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    let valid_edges = id
        .bytes()
        .next()
        .zip(id.bytes().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if id.len() > MAX_NAME_LEN || !valid_chars || !valid_edges {
        return Err(SandboxError::config(format!(
            "Invalid sandbox id '{id}': must be 1-{MAX_NAME_LEN} lowercase alphanumeric characters or '-', \
             starting and ending with an alphanumeric character"
        )));
    }
    Ok(())
}

/// Builds the override mapping for one sandbox.
pub(crate) fn build_workload_override(
    request: &CreateSandboxRequest,
    id: &str,
    settings: &ProviderSettings,
    now: DateTime<Utc>,
) -> Result<Mapping> {
    if request.image.trim().is_empty() {
        return Err(SandboxError::config("Sandbox image must not be empty"));
    }
    if request.metadata.contains_key(SANDBOX_ID_LABEL) {
        return Err(SandboxError::config(format!(
            "Metadata key '{SANDBOX_ID_LABEL}' is reserved"
        )));
    }

    let mut labels: Mapping = request
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
        .collect();
    labels.insert(SANDBOX_ID_LABEL.to_string(), Value::from(id));

    let annotations = map_of([
        (
            INGRESS_ANNOTATION,
            Value::from(settings.ingress_enabled.to_string()),
        ),
        (
            EXECD_MODE_ANNOTATION,
            Value::from(settings.execd_mode.to_string()),
        ),
    ]);

    let mut pod_spec = map_of([(
        "containers",
        Value::Sequence(vec![Value::Mapping(main_container(request, settings))]),
    )]);
    if let Some(sa) = &settings.service_account {
        pod_spec.insert("serviceAccountName".to_string(), Value::from(sa.as_str()));
    }
    if settings.execd_mode == ExecdMode::Init {
        pod_spec.insert(
            "initContainers".to_string(),
            Value::Sequence(vec![Value::Mapping(execd_installer(&settings.execd_image))]),
        );
        pod_spec.insert(
            "volumes".to_string(),
            Value::Sequence(vec![Value::Mapping(map_of([
                ("name", Value::from(EXECD_VOLUME)),
                ("emptyDir", Value::Mapping(Mapping::new())),
            ]))]),
        );
    }

    let mut spec = map_of([
        (
            "podTemplate",
            Value::Mapping(map_of([("spec", Value::Mapping(pod_spec))])),
        ),
        (
            "shutdownPolicy",
            Value::from(settings.shutdown_policy.to_string()),
        ),
    ]);
    if let Some(timeout) = request.timeout {
        let timeout = chrono::Duration::from_std(timeout)
            .map_err(|_| SandboxError::config("Sandbox timeout is out of range"))?;
        let shutdown_at = now
            .checked_add_signed(timeout)
            .ok_or_else(|| SandboxError::config("Sandbox timeout is out of range"))?;
        spec.insert("shutdownTime".to_string(), Value::from(format_timestamp(shutdown_at)));
    }

    Ok(map_of([
        ("apiVersion", Value::from(API_VERSION)),
        ("kind", Value::from(KIND)),
        (
            "metadata",
            Value::Mapping(map_of([
                ("name", Value::from(id)),
                ("namespace", Value::from(settings.namespace.as_str())),
                ("labels", Value::Mapping(labels)),
                ("annotations", Value::Mapping(annotations)),
            ])),
        ),
        ("spec", Value::Mapping(spec)),
    ]))
}

/// RFC3339 with second precision and a `Z` suffix, as Kubernetes writes it.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn main_container(request: &CreateSandboxRequest, settings: &ProviderSettings) -> Mapping {
    let mut container = map_of([
        ("name", Value::from(MAIN_CONTAINER)),
        ("image", Value::from(request.image.as_str())),
    ]);

    if !request.entrypoint.is_empty() {
        container.insert(
            "command".to_string(),
            Value::Sequence(
                request
                    .entrypoint
                    .iter()
                    .map(|arg| Value::from(arg.as_str()))
                    .collect(),
            ),
        );
    }

    let mut env: Vec<Value> = request
        .env
        .iter()
        .map(|(name, value)| env_var(name, value))
        .collect();
    if settings.execd_mode == ExecdMode::Init {
        env.push(env_var("EXECD_PATH", EXECD_BINARY));
        container.insert(
            "volumeMounts".to_string(),
            Value::Sequence(vec![Value::Mapping(map_of([
                ("name", Value::from(EXECD_VOLUME)),
                ("mountPath", Value::from(EXECD_MOUNT_PATH)),
            ]))]),
        );
    }
    if !env.is_empty() {
        container.insert("env".to_string(), Value::Sequence(env));
    }

    if !request.resource_limits.is_empty() {
        let limits: Mapping = request
            .resource_limits
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        container.insert(
            "resources".to_string(),
            Value::Mapping(map_of([("limits", Value::Mapping(limits))])),
        );
    }

    container
}

fn execd_installer(execd_image: &str) -> Mapping {
    map_of([
        ("name", Value::from(EXECD_INSTALLER)),
        ("image", Value::from(execd_image)),
        (
            "command",
            Value::Sequence(vec![
                Value::from("cp"),
                Value::from("/execd"),
                Value::from(EXECD_BINARY),
            ]),
        ),
        (
            "volumeMounts",
            Value::Sequence(vec![Value::Mapping(map_of([
                ("name", Value::from(EXECD_VOLUME)),
                ("mountPath", Value::from(EXECD_MOUNT_PATH)),
            ]))]),
        ),
    ])
}

fn env_var(name: &str, value: &str) -> Value {
    Value::Mapping(map_of([
        ("name", Value::from(name)),
        ("value", Value::from(value)),
    ]))
}
