//! Sandbox workload templates.
//!
//! Provides the recursive [`Value`] model and the [`TemplateManager`] that
//! loads the operator's base template and deep-merges per-request overrides
//! onto it.

mod manager;
mod value;

pub(crate) use manager::TemplateManager;
pub(crate) use value::{lookup, map_of, Mapping, Value};
