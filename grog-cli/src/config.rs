//! CLI configuration file (`~/.grog/config.yaml` by default).
//!
//! ```yaml
//! assets: ./assets
//! engine:
//!   caching: true
//!   delimiters: { left: "{", right: "}" }
//!   max_include_depth: 16
//! queries:
//!   recent-posts:
//!     rows:
//!       - { title: First post, author: ann, created: 1700000000 }
//!     filter: author
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use grog_template::{EngineConfig, NamedQueries, Row, Value};

/// Used when neither the flags nor the config file name an asset directory.
pub const DEFAULT_ASSET_DIR: &str = "assets";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config not found at {path}")]
    NotFound { path: PathBuf },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Template directory; relative paths are resolved against the config
    /// file's directory.
    pub assets: Option<PathBuf>,
    pub engine: EngineConfig,
    pub queries: BTreeMap<String, StaticQuery>,
}

/// A named query answered from rows listed in the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticQuery {
    pub rows: Vec<BTreeMap<String, serde_yaml::Value>>,
    /// Keep only rows whose `filter` column equals the first query parameter.
    pub filter: Option<String>,
}

impl Config {
    /// Load from `explicit` (which must exist), else from `~/.grog/config.yaml`
    /// if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                Config::load_at(path)
            }
            None => match default_path() {
                Some(path) if path.is_file() => Config::load_at(&path),
                _ => Ok(Config::default()),
            },
        }
    }

    pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if let (Some(assets), Some(dir)) = (config.assets.as_mut(), path.parent()) {
            if assets.is_relative() {
                *assets = dir.join(&*assets);
            }
        }
        tracing::debug!(path = %path.display(), queries = config.queries.len(), "loaded config");
        Ok(config)
    }

    /// `flag` (from `--assets` / `GROG_ASSET_DIR`) wins over the config file.
    pub fn asset_dir(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.assets.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_DIR))
    }

    pub fn named_queries(&self) -> NamedQueries {
        let mut queries = NamedQueries::new();
        for (name, query) in &self.queries {
            let rows: Vec<Row> = query.rows.iter().map(to_row).collect();
            let filter = query.filter.clone();
            queries.insert(name.clone(), move |params: &[Value]| {
                Ok(match (&filter, params.first()) {
                    (Some(column), Some(wanted)) => {
                        let wanted = wanted.to_string();
                        rows.iter()
                            .filter(|row| row.get(column) == Some(&wanted))
                            .cloned()
                            .collect()
                    }
                    _ => rows.clone(),
                })
            });
        }
        queries
    }
}

/// `~/.grog/config.yaml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".grog").join("config.yaml"))
}

fn to_row(raw: &BTreeMap<String, serde_yaml::Value>) -> Row {
    raw.iter()
        .map(|(column, value)| (column.clone(), scalar_text(value)))
        .collect()
}

/// Query rows are text, like columns read back from the database.
fn scalar_text(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
assets: site
engine:
  caching: false
  delimiters: { left: "[[", right: "]]" }
queries:
  posts:
    rows:
      - { title: One, author: ann, created: 1700000000 }
      - { title: Two, author: bob }
      - { title: Three, author: ann }
    filter: author
"#;

    fn write_config(dir: &TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, text).expect("write config");
        path
    }

    #[test]
    fn loads_engine_settings_and_resolves_assets() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, SAMPLE);
        let config = Config::load(Some(&path)).unwrap();

        assert!(!config.engine.caching);
        assert_eq!(config.engine.delimiters.left(), "[[");
        assert_eq!(config.engine.max_include_depth, 16);
        assert_eq!(config.asset_dir(None), dir.path().join("site"));
        assert_eq!(
            config.asset_dir(Some(Path::new("/elsewhere"))),
            PathBuf::from("/elsewhere")
        );
    }

    #[test]
    fn static_queries_filter_on_first_param() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&write_config(&dir, SAMPLE))).unwrap();
        let queries = config.named_queries();
        let posts = queries.get("posts").unwrap();

        let all = posts(&[]).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0]["created"], "1700000000");

        let ann = posts(&[Value::from("ann")]).unwrap();
        let titles: Vec<&str> = ann.iter().map(|r| r["title"].as_str()).collect();
        assert_eq!(titles, ["One", "Three"]);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn malformed_config_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "engine: [not, a, map]\n");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("config.yaml"), "{err}");
    }

    #[test]
    fn empty_delimiters_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "engine:\n  delimiters: { left: \"\", right: \"}\" }\n");
        assert!(matches!(Config::load(Some(&path)), Err(ConfigError::Parse { .. })));
    }
}
