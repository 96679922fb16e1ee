use std::path::Path;

use anyhow::Context;
use modsync_core::config::{ConfigDiscovery, ConfigLoader};

pub struct Config;

impl Config {
    pub fn execute(root: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
        match ConfigDiscovery::discover(root, config_path) {
            Some(path) => println!("# Config file: {}", path.display()),
            None => println!("# No config file found, using defaults"),
        }

        let config = ConfigLoader::load(root, config_path).context("Failed to load configuration")?;
        let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        print!("{rendered}");

        Ok(())
    }
}
