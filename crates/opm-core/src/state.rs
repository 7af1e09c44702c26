//! Installed plugin state
//!
//! Each installed plugin owns `<plugin_root>/<id>/` and records the version it
//! was installed from in `version.txt`. The plugin root is the only source of
//! truth; nothing else is persisted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, OpmError, Result};

pub const VERSION_MARKER: &str = "version.txt";

/// Prefix of the installer's scratch directories inside the plugin root
pub(crate) const SCRATCH_PREFIX: &str = ".opm-";

/// A directory found in the plugin root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPlugin {
    pub id: String,
    /// `None` when the directory has no version marker (installed by hand)
    pub version: Option<String>,
    pub path: PathBuf,
}

/// Reads installed versions from the plugin root
#[derive(Debug, Clone)]
pub struct InstallStateStore {
    plugin_root: PathBuf,
}

impl InstallStateStore {
    pub fn new(plugin_root: PathBuf) -> Self {
        Self { plugin_root }
    }

    pub fn plugin_root(&self) -> &Path {
        &self.plugin_root
    }

    pub fn plugin_dir(&self, id: &str) -> PathBuf {
        self.plugin_root.join(id)
    }

    /// Installed version of `id`
    pub fn read_installed_version(&self, id: &str) -> Result<String> {
        let dir = self.plugin_dir(id);
        read_marker(&dir)?.ok_or_else(|| OpmError::NotInstalled { id: id.to_string() })
    }

    /// Installed version of `id`, `None` when there is no directory or marker
    pub fn installed_version(&self, id: &str) -> Result<Option<String>> {
        read_marker(&self.plugin_dir(id))
    }

    /// Whether a directory exists for `id`, with or without marker
    pub fn is_present(&self, id: &str) -> bool {
        self.plugin_dir(id).is_dir()
    }

    /// Every plugin directory, sorted by id
    pub fn list_installed(&self) -> Result<Vec<InstalledPlugin>> {
        if !self.plugin_root.is_dir() {
            return Err(OpmError::PluginRootNotFound {
                path: self.plugin_root.clone(),
            });
        }

        let mut plugins = Vec::new();
        for entry in fs::read_dir(&self.plugin_root).at(&self.plugin_root)? {
            let entry = entry.at(&self.plugin_root)?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            if id.starts_with(SCRATCH_PREFIX) {
                continue;
            }
            let version = match read_marker(&path) {
                Ok(version) => version,
                Err(e) => {
                    tracing::warn!("unreadable version marker for {}: {}", id, e);
                    None
                }
            };
            plugins.push(InstalledPlugin { id, version, path });
        }

        plugins.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(plugins)
    }
}

/// Read the version marker of a plugin directory
pub fn read_marker(plugin_dir: &Path) -> Result<Option<String>> {
    let path = plugin_dir.join(VERSION_MARKER);
    match fs::read_to_string(&path) {
        Ok(content) => Ok(Some(content.trim_end_matches(['\r', '\n']).to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(OpmError::Filesystem { path, source: e }),
    }
}

/// Write the version marker; content is exactly `version`
pub fn write_marker(plugin_dir: &Path, version: &str) -> Result<()> {
    let path = plugin_dir.join(VERSION_MARKER);
    fs::write(&path, version).at(&path)
}
