//! Base workload template loading and merging.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::value::{Mapping, Value};
use crate::error::{Result, SandboxError};

/// Holds the operator-supplied base template for sandbox workloads.
///
/// The template is read once at construction and never changes afterwards.
/// Callers only ever receive copies, so the manager can be shared across
/// request handlers behind an `Arc` without locking.
#[derive(Debug, Clone, Default)]
pub(crate) struct TemplateManager {
    template: Option<Mapping>,
    template_file_path: Option<PathBuf>,
}

impl TemplateManager {
    /// Loads the template at `path`, or creates an empty manager for `None`.
    ///
    /// Fails when the file is missing, is not valid YAML, or its root is
    /// not a mapping.
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No sandbox template configured");
            return Ok(Self::default());
        };

        let template = load_template(path)?;
        info!(
            path = %path.display(),
            keys = template.len(),
            "Loaded sandbox template"
        );

        Ok(Self {
            template: Some(template),
            template_file_path: Some(path.to_path_buf()),
        })
    }

    /// Builds a manager around an in-memory template.
    #[cfg(test)]
    pub fn from_mapping(template: Mapping) -> Self {
        Self {
            template: Some(template),
            template_file_path: None,
        }
    }

    /// Path the template was loaded from, if any.
    pub fn template_file_path(&self) -> Option<&Path> {
        self.template_file_path.as_deref()
    }

    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    /// Returns an independent copy of the base template.
    pub fn get_base_template(&self) -> Mapping {
        self.template.clone().unwrap_or_default()
    }

    /// Merges `override_` on top of `base`, returning a new mapping.
    ///
    /// - null override values leave the base value in place
    /// - mappings present on both sides merge recursively
    /// - everything else, sequences included, is replaced by the override
    pub fn deep_merge(base: &Mapping, override_: &Mapping) -> Mapping {
        let mut result = base.clone();

        for (key, value) in override_ {
            let merged = match (base.get(key), value) {
                (_, Value::Null) => continue,
                (Some(Value::Mapping(existing)), Value::Mapping(nested)) => {
                    Value::Mapping(Self::deep_merge(existing, nested))
                }
                _ => Self::deep_copy(value),
            };
            result.insert(key.clone(), merged);
        }

        result
    }

    /// Structural deep copy of a value.
    pub fn deep_copy(value: &Value) -> Value {
        match value {
            Value::Mapping(map) => Value::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::deep_copy(v)))
                    .collect(),
            ),
            Value::Sequence(items) => Value::Sequence(items.iter().map(Self::deep_copy).collect()),
            scalar => scalar.clone(),
        }
    }
}

fn load_template(path: &Path) -> Result<Mapping> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            return Err(SandboxError::template_not_found(path));
        }
        Err(e) => return Err(SandboxError::template_parse(path, e.to_string())),
    };

    let parse_error = |e: serde_yaml::Error| SandboxError::template_parse(path, e.to_string());

    // `<<: *anchor` merge keys are expanded before conversion
    let mut raw: serde_yaml::Value = serde_yaml::from_str(&content).map_err(parse_error)?;
    raw.apply_merge().map_err(parse_error)?;
    let value: Value = serde_yaml::from_value(raw).map_err(parse_error)?;

    match value {
        Value::Mapping(map) => Ok(map),
        other => Err(SandboxError::template_schema(path, other.type_name())),
    }
}
