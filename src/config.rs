use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub processes: Vec<ProcessTarget>,
    pub settings: Settings,
}

/// A configured process identity. Resolved each tick to zero or more live
/// OS processes; readings over multiple matches are summed.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProcessTarget {
    pub name: String,
    /// Match process names exactly instead of by substring.
    pub exact: bool,
}

impl Default for ProcessTarget {
    fn default() -> Self {
        ProcessTarget {
            name: String::new(),
            exact: false,
        }
    }
}

impl ProcessTarget {
    pub fn named(name: &str) -> Self {
        ProcessTarget {
            name: name.to_string(),
            exact: false,
        }
    }

    pub fn matches(&self, process_name: &str) -> bool {
        if self.exact {
            process_name == self.name
        } else {
            process_name.contains(&self.name)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub interval_secs: u64,
    pub output_dir: PathBuf,
    pub live_enabled: bool,
    pub live_port: u16,
    pub pdf_enabled: bool,
    /// Oldest-first trim bound on the in-memory series; unbounded if unset.
    pub max_samples: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            interval_secs: 10,
            output_dir: PathBuf::from("./output"),
            live_enabled: false,
            live_port: 5000,
            pdf_enabled: false,
            max_samples: None,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("procwatch").join("config.toml"))
}

/// Default-path lookup: a missing file falls back to defaults, but a file
/// that exists and fails to parse is a startup error.
pub fn load_config() -> Result<Config> {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Ok(Config::default()),
    }
}

/// An explicitly requested config file must load; unreadable or invalid
/// configuration is fatal at startup.
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents).wrap_err_with(|| format!("invalid config file {}", path.display()))
}
