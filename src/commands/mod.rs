//! CLI command implementations.
//!
//! Each submodule implements one command with pure core logic separated
//! from IO for testability.

pub mod check;
pub mod init;
pub mod render;
pub mod template;
