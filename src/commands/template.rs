use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::config::AppConfig;
use crate::template::{Mapping, TemplateManager};

/// Prints the configured base template as YAML.
pub async fn run(config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let template_file = config
        .agent_sandbox_or_default()
        .template_file
        .as_deref()
        .map(|p| config.resolve_path(p))
        .transpose()?;

    let manager = TemplateManager::new(template_file.as_deref())?;
    match manager.template_file_path() {
        Some(path) => debug!(path = %path.display(), "Printing base template"),
        None => debug!("No template configured, printing empty base"),
    }
    print!("{}", render_base_template(&manager.get_base_template())?);
    Ok(())
}

/// An empty template renders as `{}`.
fn render_base_template(template: &Mapping) -> Result<String> {
    serde_yaml::to_string(template).context("Failed to serialize base template")
}
