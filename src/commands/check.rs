use anyhow::Result;
use colored::Colorize;
use std::fmt::Write;
use std::path::Path;

use crate::config::AppConfig;
use crate::sandbox::{InMemoryProvider, SandboxService};

/// Loads the config and builds the sandbox service against an in-memory provider.
///
/// Service construction errors carry their machine code and HTTP status.
pub async fn run(config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;

    let service = SandboxService::new(&config, &InMemoryProvider::factory()).map_err(|e| {
        let context = format!(
            "Configuration check failed [{} / HTTP {}]",
            e.code(),
            e.http_status()
        );
        anyhow::Error::new(e).context(context)
    })?;

    print!("{}", format_summary(config_path, &config, &service));
    Ok(())
}

fn format_summary(config_path: &Path, config: &AppConfig, service: &SandboxService) -> String {
    let mut out = String::new();
    let settings = service.settings();

    writeln!(&mut out, "\n{}", "━".repeat(50).dimmed()).unwrap();
    writeln!(&mut out, "{}", "   ✓ Configuration OK".green().bold()).unwrap();
    writeln!(&mut out, "{}", "━".repeat(50).dimmed()).unwrap();
    writeln!(
        &mut out,
        "  Config:          {}",
        config_path.display().to_string().cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  Runtime:         {}",
        config.runtime.runtime_type.to_string().cyan()
    )
    .unwrap();
    writeln!(&mut out, "  Namespace:       {}", service.namespace().cyan()).unwrap();
    writeln!(&mut out, "  Execd image:     {}", service.execd_image().cyan()).unwrap();
    writeln!(
        &mut out,
        "  Execd mode:      {}",
        service.execd_mode().to_string().cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  Shutdown policy: {}",
        service.shutdown_policy().to_string().cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  Kubeconfig:      {}",
        settings
            .kubeconfig_path
            .as_ref()
            .map_or_else(|| "in-cluster".to_string(), |p| p.display().to_string())
            .cyan()
    )
    .unwrap();

    let template = match &settings.template_file_path {
        Some(path) if service.templates().has_template() => path.display().to_string(),
        _ => "none (empty base)".to_string(),
    };
    writeln!(&mut out, "  Template:        {}", template.cyan()).unwrap();
    writeln!(&mut out, "{}", "━".repeat(50).dimmed()).unwrap();

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KubernetesRuntimeConfig, RuntimeType};

    fn agent_sandbox_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.runtime.runtime_type = RuntimeType::AgentSandbox;
        config.kubernetes = Some(KubernetesRuntimeConfig {
            namespace: "sandboxes".to_string(),
            ..KubernetesRuntimeConfig::default()
        });
        config
    }

    #[test]
    fn test_format_summary() {
        let config = agent_sandbox_config();
        let service = SandboxService::new(&config, &InMemoryProvider::factory()).unwrap();

        let output = format_summary(Path::new("opensandbox.toml"), &config, &service);
        assert!(output.contains("Configuration OK"));
        assert!(output.contains("agent-sandbox"));
        assert!(output.contains("sandboxes"));
        assert!(output.contains("in-cluster"));
        assert!(output.contains("none (empty base)"));
    }

    #[tokio::test]
    async fn test_run_reports_code_and_status_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opensandbox.toml");
        std::fs::write(&path, "[runtime]\ntype = \"docker\"\n").unwrap();

        let err = run(&path).await.unwrap_err();
        let report = format!("{err:?}");
        assert_eq!(err.to_string(), "Configuration check failed [INVALID_CONFIGURATION / HTTP 500]");
        assert_eq!(report.matches("requires runtime.type").count(), 1);
        assert_eq!(report.matches("INVALID_CONFIGURATION").count(), 1);
    }

    #[tokio::test]
    async fn test_run_missing_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(&dir.path().join("missing.toml")).await;
        assert!(result.is_err());
    }
}
