//! Write starter configuration and base template into a directory.
//!
//! Pure planning logic takes closures for filesystem access so it can be
//! tested without touching disk.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::CONFIG_FILE;
use crate::templates;

/// Relative path of the starter base template.
const TEMPLATE_PATH: &str = "deploy/sandbox-template.yaml";

/// Runs the init command in the current directory.
pub async fn run(force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    info!("Writing starter files to {}", cwd.display());

    let files = init_files();
    let results = init_project(
        &files,
        force,
        |path| cwd.join(path).exists(),
        |path| {
            fs::create_dir_all(cwd.join(path))
                .with_context(|| format!("Failed to create directory: {}", path.display()))
        },
        |path, content| {
            fs::write(cwd.join(path), content)
                .with_context(|| format!("Failed to write {}", path.display()))
        },
    )?;

    print!("{}", format_results(&results, &files));
    Ok(())
}

/// A starter file with its relative path and content.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InitFile {
    path: PathBuf,
    content: &'static str,
    description: &'static str,
}

/// Outcome for one starter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteResult {
    Created,
    Overwritten,
    Skipped,
}

fn init_files() -> Vec<InitFile> {
    vec![
        InitFile {
            path: PathBuf::from(CONFIG_FILE),
            content: templates::OPENSANDBOX_TOML,
            description: "Runtime configuration",
        },
        InitFile {
            path: PathBuf::from(TEMPLATE_PATH),
            content: templates::SANDBOX_TEMPLATE_YAML,
            description: "Base sandbox workload template",
        },
    ]
}

/// Writes each file unless it exists and `force` is off.
fn init_project<E, D, W>(
    files: &[InitFile],
    force: bool,
    exists: E,
    create_dir: D,
    mut write_file: W,
) -> Result<Vec<(PathBuf, WriteResult)>>
where
    E: Fn(&Path) -> bool,
    D: Fn(&Path) -> Result<()>,
    W: FnMut(&Path, &str) -> Result<()>,
{
    let mut results = Vec::with_capacity(files.len());

    for file in files {
        let existed = exists(&file.path);
        if existed && !force {
            results.push((file.path.clone(), WriteResult::Skipped));
            continue;
        }

        if let Some(parent) = file.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir(parent)?;
        }
        write_file(&file.path, file.content)?;

        let result = if existed {
            WriteResult::Overwritten
        } else {
            WriteResult::Created
        };
        results.push((file.path.clone(), result));
    }

    Ok(results)
}

fn format_results(results: &[(PathBuf, WriteResult)], files: &[InitFile]) -> String {
    let mut out = String::new();

    writeln!(&mut out, "\n{} Starter files written\n", "✓".green().bold()).unwrap();

    for (path, result) in results {
        let desc = files
            .iter()
            .find(|f| &f.path == path)
            .map_or("", |f| f.description);

        match result {
            WriteResult::Created => {
                writeln!(&mut out, "  {} - {}", path.display().to_string().cyan(), desc).unwrap();
            }
            WriteResult::Overwritten => {
                writeln!(&mut out, "  {} {} (overwritten)", "↻".blue(), path.display()).unwrap();
            }
            WriteResult::Skipped => {
                writeln!(
                    &mut out,
                    "  {} {} (already exists, use --force to overwrite)",
                    "⊘".yellow(),
                    path.display()
                )
                .unwrap();
            }
        }
    }

    writeln!(&mut out, "\n{}", "Next steps:".yellow().bold()).unwrap();
    writeln!(
        &mut out,
        "  1. Point {} at your cluster",
        CONFIG_FILE.cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  2. Adjust scheduling defaults in {}",
        TEMPLATE_PATH.cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  3. Run {} to validate",
        "opensandbox-runtime check".green()
    )
    .unwrap();

    out
}
