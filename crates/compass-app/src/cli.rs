//! Command-line flags and their environment fallbacks.
//!
//! A flag beats its `COMPASS_*` variable, which beats the config file.

use std::path::PathBuf;

use clap::Parser;

use compass_core::config::{CompassConfig, GeneralConfig};

/// Compass - a map-driven travel assistant that talks about where you point.
#[derive(Parser, Debug)]
#[command(name = "compass", version, about)]
pub struct CliArgs {
    /// Configuration file [env: COMPASS_CONFIG, default: ~/.compass/config.toml]
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port [env: COMPASS_PORT]
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Directory holding compass.db [env: COMPASS_DATA_DIR]
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// trace, debug, info, warn or error [env: COMPASS_LOG]
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    pub fn config_path(&self) -> PathBuf {
        self.config_path_with(|key| std::env::var(key).ok())
    }

    /// Override the `[general]` section from flags and the environment.
    pub fn apply(&self, config: &mut CompassConfig) {
        self.apply_with(&mut config.general, |key| std::env::var(key).ok());
    }

    fn config_path_with(&self, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        self.config
            .clone()
            .or_else(|| env("COMPASS_CONFIG").map(PathBuf::from))
            .unwrap_or_else(default_config_path)
    }

    fn apply_with(&self, general: &mut GeneralConfig, env: impl Fn(&str) -> Option<String>) {
        // An unparsable COMPASS_PORT is ignored.
        if let Some(port) = self
            .port
            .or_else(|| env("COMPASS_PORT").and_then(|v| v.parse().ok()))
        {
            general.port = port;
        }
        if let Some(dir) = self
            .data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| env("COMPASS_DATA_DIR"))
        {
            general.data_dir = dir;
        }
        if let Some(level) = self.log_level.clone().or_else(|| env("COMPASS_LOG")) {
            general.log_level = level;
        }
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");

    match home {
        Ok(home) => PathBuf::from(home).join(".compass").join("config.toml"),
        Err(_) => PathBuf::from("config.toml"),
    }
}
