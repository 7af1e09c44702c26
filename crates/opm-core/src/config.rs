use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, OpmError, Result};

pub const CONFIG_ENV: &str = "OPM_CONFIG";
const CONFIG_DIR: &str = "opm";
const CONFIG_FILE: &str = "config.toml";
const REPOSITORY_FILE: &str = "repo.json";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# opm configuration file
# Location: $OPM_CONFIG or <config dir>/opm/config.toml

# OBS plugin directory plugins are installed into
# Default: platform specific OBS location
# plugin_path = "/home/me/.config/obs-studio/plugins"

[repository]
# Local copy of the plugin repository manifest
# path = "/home/me/.local/share/opm/repo.json"

# Remote manifest fetched by `opm refresh`
# url = "https://example.com/opm/repo.json"

[download]
# Whole-transfer timeout in seconds
timeout_secs = 300

[install]
# Install the first artifact for the OS when none declares this machine's
# architecture
allow_arch_fallback = true
"#;

/// Global configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_plugin_path")]
    pub plugin_path: PathBuf,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub install: InstallConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_repository_path")]
    pub path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default = "default_true")]
    pub allow_arch_fallback: bool,
}

fn default_plugin_path() -> PathBuf {
    if cfg!(target_os = "windows") {
        PathBuf::from(r"C:\ProgramData\obs-studio\plugins")
    } else if cfg!(target_os = "macos") {
        PathBuf::from("/Library/Application Support/obs-studio/plugins")
    } else {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("obs-studio")
            .join("plugins")
    }
}

fn default_repository_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(CONFIG_DIR).join(REPOSITORY_FILE))
        .unwrap_or_else(|| PathBuf::from(REPOSITORY_FILE))
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugin_path: default_plugin_path(),
            repository: RepositoryConfig::default(),
            download: DownloadConfig::default(),
            install: InstallConfig::default(),
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: default_repository_path(),
            url: None,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            allow_arch_fallback: true,
        }
    }
}

impl Config {
    /// Config file location: `$OPM_CONFIG`, else the user config directory
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .map(|d| d.join(CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".").join(CONFIG_DIR))
            .join(CONFIG_FILE)
    }

    /// Load config from `path`, falling back to defaults when it doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).at(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| OpmError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Save config to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| OpmError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        fs::write(path, content).at(path)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }

        if !path.exists() {
            fs::write(path, DEFAULT_CONFIG_TEMPLATE).at(path)?;
        }

        Ok(())
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |message: String| OpmError::ConfigValue {
            key: key.to_string(),
            message,
        };

        match key {
            "plugin_path" => self.plugin_path = PathBuf::from(value),
            "repository.path" => self.repository.path = PathBuf::from(value),
            "repository.url" => {
                self.repository.url = if value.trim().is_empty() {
                    None
                } else {
                    Some(value.trim().to_string())
                }
            }
            "download.timeout_secs" => {
                self.download.timeout_secs = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("expected a number of seconds, got '{}'", value)))?
            }
            "install.allow_arch_fallback" => {
                self.install.allow_arch_fallback = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("expected true or false, got '{}'", value)))?
            }
            _ => {
                return Err(OpmError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            (
                "plugin_path".to_string(),
                self.plugin_path.display().to_string(),
            ),
            (
                "repository.path".to_string(),
                self.repository.path.display().to_string(),
            ),
            (
                "repository.url".to_string(),
                self.repository.url.clone().unwrap_or_default(),
            ),
            (
                "download.timeout_secs".to_string(),
                self.download.timeout_secs.to_string(),
            ),
            (
                "install.allow_arch_fallback".to_string(),
                self.install.allow_arch_fallback.to_string(),
            ),
        ]
    }
}
