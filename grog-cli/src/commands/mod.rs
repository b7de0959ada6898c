pub mod check;
pub mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};

use grog_template::{DirSource, Engine};

use crate::config::Config;
use crate::formatters;
use crate::GlobalArgs;

/// Everything a command needs: the loaded config, the asset directory and an
/// engine reading templates from it.
pub struct Site {
    pub config: Config,
    pub assets: PathBuf,
    pub engine: Engine,
}

impl Site {
    pub fn open(global: &GlobalArgs) -> Result<Site> {
        let mut config = Config::load(global.config.as_deref()).context("failed to load config")?;
        if global.no_cache {
            config.engine.caching = false;
        }
        let assets = config.asset_dir(global.assets.as_deref());
        if !assets.is_dir() {
            anyhow::bail!("asset directory {} does not exist", assets.display());
        }
        tracing::debug!(assets = %assets.display(), caching = config.engine.caching, "opening site");
        let engine = Engine::with_config(
            DirSource::new(&assets),
            formatters::registry(),
            config.engine.clone(),
        );
        Ok(Site {
            config,
            assets,
            engine,
        })
    }
}
