use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use trafficguard_policy_center::{
    load_settings_with_options, GuardSettings, LoadOptions, LoadedSettings,
};

use crate::config::Config;

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    metrics_port: u16,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf, metrics_port: Option<u16>) -> Self {
        let metrics_port = metrics_port.unwrap_or(config.metrics_port);
        Self {
            config: Arc::new(config),
            config_path,
            metrics_port,
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn metrics_port(&self) -> u16 {
        self.metrics_port
    }

    /// Guard settings layered from built-in defaults, the settings file and the environment.
    pub fn load_settings(&self) -> Result<LoadedSettings> {
        let options = LoadOptions {
            paths: self.config.settings_path.iter().cloned().collect(),
            include_env: true,
        };
        load_settings_with_options(&options).context("failed to load guard settings")
    }

    pub fn settings(&self) -> Result<GuardSettings> {
        self.load_settings().map(|loaded| loaded.settings)
    }
}
