//! Domain-specific error types for template and sandbox operations.
//!
//! Every failure that crosses the core boundary is a [`SandboxError`].
//! Callers match on [`SandboxError::kind`] or the stable machine code from
//! [`SandboxError::code`] rather than parsing message strings.

use std::fmt;
use std::path::{Path, PathBuf};

/// Coarse classification of a [`SandboxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ErrorKind {
    /// Template file does not exist.
    NotFound,
    /// Template file is not a valid YAML document.
    ParseError,
    /// Template document root is not a mapping.
    SchemaError,
    /// Configuration is wrong for this service.
    ConfigError,
    /// The orchestration-platform client or provider could not be built.
    UpstreamUnavailable,
    /// No sandbox with the requested id exists.
    DomainNotFound,
    /// A sandbox with the requested id already exists.
    AlreadyExists,
    /// A workload snapshot is missing required fields.
    MalformedWorkload,
    /// A provider operation failed after construction.
    ProviderFailed,
}

/// Stable machine-readable error codes surfaced to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ErrorCode {
    TemplateNotFound,
    TemplateParseError,
    TemplateSchemaError,
    InvalidConfiguration,
    K8sInitializationError,
    SandboxNotFound,
    SandboxAlreadyExists,
    InvalidWorkload,
    K8sApiError,
}

impl ErrorCode {
    /// Returns the wire representation of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            Self::TemplateParseError => "TEMPLATE_PARSE_ERROR",
            Self::TemplateSchemaError => "TEMPLATE_SCHEMA_ERROR",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
            Self::K8sInitializationError => "K8S_INITIALIZATION_ERROR",
            Self::SandboxNotFound => "SANDBOX_NOT_FOUND",
            Self::SandboxAlreadyExists => "SANDBOX_ALREADY_EXISTS",
            Self::InvalidWorkload => "INVALID_WORKLOAD",
            Self::K8sApiError => "K8S_API_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while loading templates or managing sandboxes.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SandboxError {
    /// Template file was not found on disk.
    #[error("Template file not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    /// Template file exists but could not be read or parsed.
    #[error("Failed to load template file {}: {message}", path.display())]
    TemplateParse { path: PathBuf, message: String },

    /// Template file parsed to something other than a mapping.
    #[error("Template file {} must be a YAML object, got {actual}", path.display())]
    TemplateSchema { path: PathBuf, actual: &'static str },

    /// Service configuration is invalid.
    #[error("{message}")]
    Config { message: String },

    /// The Kubernetes client or workload provider could not be initialized.
    #[error("Failed to initialize Kubernetes runtime: {message}")]
    UpstreamUnavailable { message: String },

    /// Sandbox does not exist.
    #[error("Sandbox {id} not found")]
    NotFound { id: String },

    /// Sandbox already exists.
    #[error("Sandbox {id} already exists")]
    AlreadyExists { id: String },

    /// Workload snapshot lacks a required field.
    #[error("Malformed workload: {message}")]
    MalformedWorkload { message: String },

    /// Provider call failed.
    #[error("Workload provider operation failed: {message}")]
    Provider { message: String },
}

pub(crate) type Result<T, E = SandboxError> = std::result::Result<T, E>;

impl SandboxError {
    /// Creates a `TemplateNotFound` error.
    pub fn template_not_found(path: impl AsRef<Path>) -> Self {
        Self::TemplateNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a `TemplateParse` error.
    pub fn template_parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::TemplateParse {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates a `TemplateSchema` error naming the actual root type.
    pub fn template_schema(path: impl AsRef<Path>, actual: &'static str) -> Self {
        Self::TemplateSchema {
            path: path.as_ref().to_path_buf(),
            actual,
        }
    }

    /// Creates a `Config` error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an `UpstreamUnavailable` error.
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `NotFound` error for a sandbox id.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates an `AlreadyExists` error for a sandbox id.
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Creates a `MalformedWorkload` error.
    pub fn malformed_workload(message: impl Into<String>) -> Self {
        Self::MalformedWorkload {
            message: message.into(),
        }
    }

    /// Creates a `Provider` error for platform call failures.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TemplateNotFound { .. } => ErrorKind::NotFound,
            Self::TemplateParse { .. } => ErrorKind::ParseError,
            Self::TemplateSchema { .. } => ErrorKind::SchemaError,
            Self::Config { .. } => ErrorKind::ConfigError,
            Self::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::NotFound { .. } => ErrorKind::DomainNotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::MalformedWorkload { .. } => ErrorKind::MalformedWorkload,
            Self::Provider { .. } => ErrorKind::ProviderFailed,
        }
    }

    /// Returns the stable machine code for this error.
    pub fn code(&self) -> ErrorCode {
        match self.kind() {
            ErrorKind::NotFound => ErrorCode::TemplateNotFound,
            ErrorKind::ParseError => ErrorCode::TemplateParseError,
            ErrorKind::SchemaError => ErrorCode::TemplateSchemaError,
            ErrorKind::ConfigError => ErrorCode::InvalidConfiguration,
            ErrorKind::UpstreamUnavailable => ErrorCode::K8sInitializationError,
            ErrorKind::DomainNotFound => ErrorCode::SandboxNotFound,
            ErrorKind::AlreadyExists => ErrorCode::SandboxAlreadyExists,
            ErrorKind::MalformedWorkload => ErrorCode::InvalidWorkload,
            ErrorKind::ProviderFailed => ErrorCode::K8sApiError,
        }
    }

    /// HTTP status an API layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::UpstreamUnavailable => 503,
            ErrorKind::DomainNotFound => 404,
            ErrorKind::AlreadyExists => 409,
            ErrorKind::ProviderFailed => 502,
            ErrorKind::NotFound
            | ErrorKind::ParseError
            | ErrorKind::SchemaError
            | ErrorKind::ConfigError
            | ErrorKind::MalformedWorkload => 500,
        }
    }

    /// Returns true for errors raised while loading a template file.
    #[allow(dead_code)] // Public API for callers
    pub fn is_template_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::ParseError | ErrorKind::SchemaError
        )
    }

    /// Returns true if this is a sandbox-not-found error.
    #[allow(dead_code)] // Public API for callers
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is an id-collision error.
    #[allow(dead_code)] // Public API for callers
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_not_found_message() {
        let err = SandboxError::template_not_found("/tmp/missing.yaml");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_template_error());
        assert_eq!(err.to_string(), "Template file not found: /tmp/missing.yaml");
    }

    #[test]
    fn test_template_schema_names_actual_type() {
        let err = SandboxError::template_schema("t.yaml", "list");
        assert_eq!(err.kind(), ErrorKind::SchemaError);
        assert!(err.to_string().contains("must be a YAML object"));
        assert!(err.to_string().contains("got list"));
    }

    #[test]
    fn test_upstream_unavailable_maps_to_503() {
        let err = SandboxError::upstream_unavailable("kubeconfig missing");
        assert_eq!(err.code(), ErrorCode::K8sInitializationError);
        assert_eq!(err.code().as_str(), "K8S_INITIALIZATION_ERROR");
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn test_domain_errors_have_distinct_statuses() {
        let missing = SandboxError::not_found("abc");
        let dup = SandboxError::already_exists("abc");

        assert!(missing.is_not_found());
        assert!(!missing.is_already_exists());
        assert_eq!(missing.http_status(), 404);
        assert_eq!(missing.to_string(), "Sandbox abc not found");

        assert!(dup.is_already_exists());
        assert_eq!(dup.http_status(), 409);
        assert_eq!(dup.code().to_string(), "SANDBOX_ALREADY_EXISTS");
    }

    #[test]
    fn test_config_error_keeps_message_verbatim() {
        let err = SandboxError::config("requires runtime.type = 'agent-sandbox'");
        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert_eq!(err.to_string(), "requires runtime.type = 'agent-sandbox'");
        assert!(!err.is_template_error());
    }
}
