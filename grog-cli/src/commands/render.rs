//! `grog render <name>` — render one template against a data file.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use grog_template::{RequestState, TemplateData, Value};

use super::Site;
use crate::GlobalArgs;

/// Arguments for `grog render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Template name, relative to the asset directory.
    pub name: String,

    /// YAML or JSON file bound as `model`.
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Request query string, e.g. `posts-page=2`.
    #[arg(long)]
    pub query: Option<String>,

    /// Request cookie as NAME=VALUE; repeatable.
    #[arg(long = "cookie", value_parser = parse_cookie)]
    pub cookies: Vec<(String, String)>,

    /// Write output here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl RenderArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let site = Site::open(global)?;
        let model = match &self.data {
            Some(path) => load_model(path)?,
            None => Value::Null,
        };

        let mut request = RequestState::new();
        if let Some(query) = &self.query {
            request.add_query(query);
        }
        for (name, value) in &self.cookies {
            request = request.with_cookie(name, value);
        }

        let queries = site.config.named_queries();
        let rendered = {
            let mut data = TemplateData::new(model, &queries).with_transport(&mut request);
            site.engine
                .render_to_vec(&self.name, &mut data)
                .with_context(|| format!("failed to render '{}'", self.name))?
        };

        match &self.output {
            Some(path) => std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&rendered).context("failed to write output")?;
                stdout.flush().context("failed to write output")?;
            }
        }

        for cookie in request.set_cookies() {
            eprintln!("Set-Cookie: {cookie}");
        }
        Ok(())
    }
}

fn load_model(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read data file {}", path.display()))?;
    let json: serde_json::Value = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON in {}", path.display()))?
    } else {
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML in {}", path.display()))?
    };
    Ok(Value::from(json))
}

fn parse_cookie(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}
