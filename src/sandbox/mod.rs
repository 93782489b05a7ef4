//! Sandbox lifecycle on the agent-sandbox runtime.
//!
//! The [`SandboxService`] merges per-request overrides over the base
//! template, hands the result to a [`WorkloadProvider`], and maps workload
//! snapshots back into the [`Sandbox`] domain model.

mod manifest;
mod memory;
mod model;
mod provider;
mod service;
mod workload;

pub(crate) use memory::InMemoryProvider;
pub(crate) use model::{CreateSandboxRequest, ImageSpec, Sandbox, SandboxState, SandboxStatus};
pub(crate) use service::SandboxService;
