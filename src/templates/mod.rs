//! Embedded starter files written by `opensandbox-runtime init`.

/// Default `opensandbox.toml` configuration.
pub(crate) const OPENSANDBOX_TOML: &str = include_str!("opensandbox.toml");

/// Base workload template for agent-sandbox resources.
pub(crate) const SANDBOX_TEMPLATE_YAML: &str = include_str!("sandbox-template.yaml");
