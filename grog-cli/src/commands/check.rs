//! `grog check` — compile templates and report syntax errors.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use grog_template::RenderError;

use super::Site;
use crate::GlobalArgs;

/// Arguments for `grog check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Templates to check (default: every file in the asset directory).
    pub names: Vec<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct CheckReportJson<'a> {
    checked: usize,
    failed: usize,
    templates: &'a [CheckResult],
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "template")]
    template: String,
    #[tabled(rename = "line")]
    line: String,
    #[tabled(rename = "error")]
    error: String,
}

impl CheckArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let site = Site::open(global)?;
        let names = if self.names.is_empty() {
            template_names(&site.assets)?
        } else {
            self.names
        };

        let results: Vec<CheckResult> = names
            .into_iter()
            .map(|name| match site.engine.compile(&name) {
                Ok(_) => CheckResult {
                    name,
                    ok: true,
                    line: None,
                    error: None,
                },
                Err(err) => CheckResult {
                    line: error_line(&err),
                    error: Some(err.to_string()),
                    name,
                    ok: false,
                },
            })
            .collect();
        let failed = results.iter().filter(|r| !r.ok).count();

        if self.json {
            let payload = CheckReportJson {
                checked: results.len(),
                failed,
                templates: &results,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize check JSON")?
            );
        } else {
            print_report(&results, failed);
        }

        if failed > 0 {
            anyhow::bail!("{failed} of {} templates failed to compile", results.len());
        }
        Ok(())
    }
}

fn print_report(results: &[CheckResult], failed: usize) {
    if results.is_empty() {
        println!("No templates found.");
        return;
    }
    for result in results {
        if result.ok {
            println!("{} {}", "✓".green(), result.name);
        } else {
            println!("{} {}", "✗".red(), result.name);
        }
    }
    if failed == 0 {
        println!("{} templates OK", results.len());
        return;
    }

    let rows: Vec<FailureRow> = results
        .iter()
        .filter(|r| !r.ok)
        .map(|r| FailureRow {
            template: r.name.clone(),
            line: r.line.map(|l| l.to_string()).unwrap_or_default(),
            error: r.error.clone().unwrap_or_default(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn error_line(err: &RenderError) -> Option<usize> {
    match err {
        RenderError::Parse(parse) => Some(parse.line),
        _ => None,
    }
}

/// Every file under `dir`, as `/`-separated names relative to it, sorted.
fn template_names(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    let mut names: Vec<String> = files
        .iter()
        .filter_map(|path| path.strip_prefix(dir).ok())
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .collect();
    names.sort();
    Ok(names)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
        let path = entry.path();
        let meta = entry
            .metadata()
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if meta.is_dir() {
            collect_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn template_names_are_relative_and_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("partials")).unwrap();
        std::fs::write(dir.path().join("index.html"), "").unwrap();
        std::fs::write(dir.path().join("partials/nav.html"), "").unwrap();
        std::fs::write(dir.path().join("about.html"), "").unwrap();

        assert_eq!(
            template_names(dir.path()).unwrap(),
            ["about.html", "index.html", "partials/nav.html"]
        );
    }
}
