//! Render the workload a create request would submit.
//!
//! Without `--json` the merged workload manifest is printed as YAML. With
//! `--json` the request goes through the full create path against an
//! in-memory provider and the resulting sandbox is printed instead.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::config::AppConfig;
use crate::sandbox::{CreateSandboxRequest, InMemoryProvider, SandboxService};

/// Raw CLI arguments for the render command.
#[derive(Debug, Clone, Default)]
pub(crate) struct RenderArgs {
    pub image: String,
    pub id: Option<String>,
    pub command: Option<String>,
    pub labels: Vec<String>,
    pub env: Vec<String>,
    pub resources: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub json: bool,
}

pub async fn run(config_path: &Path, args: RenderArgs) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let service = SandboxService::new(&config, &InMemoryProvider::factory())?;
    let json = args.json;
    let request = build_request(args)?;

    let output = if json {
        let sandbox = service.create_sandbox(request).await?;
        serde_json::to_string_pretty(&sandbox).context("Failed to serialize sandbox")? + "\n"
    } else {
        let id = request
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let manifest = service.render_workload(&id, &request, Utc::now())?;
        serde_yaml::to_string(&manifest).context("Failed to serialize workload")?
    };

    print!("{output}");
    Ok(())
}

/// Turns CLI arguments into a create request.
fn build_request(args: RenderArgs) -> Result<CreateSandboxRequest> {
    let mut request = CreateSandboxRequest::new(args.image);
    request.id = args.id;

    if let Some(command) = args.command {
        request.entrypoint = shell_words::split(&command)
            .with_context(|| format!("Failed to parse --command: {command}"))?;
    }

    request.metadata = parse_pairs("--label", &args.labels)?;
    request.env = parse_pairs("--env", &args.env)?;
    request.resource_limits = parse_pairs("--resource", &args.resources)?;
    request.timeout = args.timeout_secs.map(Duration::from_secs);

    debug!(?request, "Built create request");
    Ok(request)
}

/// Parses `KEY=VALUE` pairs. The value may itself contain `=`.
fn parse_pairs(flag: &str, raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut pairs = BTreeMap::new();
    for item in raw {
        let Some((key, value)) = item.split_once('=') else {
            bail!("Invalid {flag} '{item}': expected KEY=VALUE");
        };
        if key.is_empty() {
            bail!("Invalid {flag} '{item}': key is empty");
        }
        pairs.insert(key.to_string(), value.to_string());
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(image: &str) -> RenderArgs {
        RenderArgs {
            image: image.to_string(),
            ..RenderArgs::default()
        }
    }

    #[test]
    fn test_parse_pairs() {
        let raw = vec!["team=platform".to_string(), "query=a=b".to_string()];
        let pairs = parse_pairs("--label", &raw).unwrap();
        assert_eq!(pairs.get("team").map(String::as_str), Some("platform"));
        assert_eq!(pairs.get("query").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn test_parse_pairs_rejects_missing_equals() {
        let err = parse_pairs("--env", &["NOVALUE".to_string()]).unwrap_err();
        assert!(err.to_string().contains("--env"));
        assert!(err.to_string().contains("KEY=VALUE"));
    }

    #[test]
    fn test_parse_pairs_rejects_empty_key() {
        assert!(parse_pairs("--label", &["=x".to_string()]).is_err());
    }

    #[test]
    fn test_build_request_splits_command() {
        let mut raw = args("python:3.11");
        raw.command = Some(r#"python -c "print('hi there')""#.to_string());
        raw.timeout_secs = Some(600);

        let request = build_request(raw).unwrap();
        assert_eq!(
            request.entrypoint,
            vec![
                "python".to_string(),
                "-c".to_string(),
                "print('hi there')".to_string()
            ]
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_build_request_rejects_unbalanced_quotes() {
        let mut raw = args("alpine");
        raw.command = Some("sh -c 'echo".to_string());
        assert!(build_request(raw).is_err());
    }

    #[test]
    fn test_build_request_defaults() {
        let request = build_request(args("alpine")).unwrap();
        assert!(request.id.is_none());
        assert!(request.entrypoint.is_empty());
        assert!(request.metadata.is_empty());
        assert!(request.timeout.is_none());
    }
}
