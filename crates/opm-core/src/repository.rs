//! Plugin repository model
//!
//! The repository manifest is a JSON document of the form
//!
//! ```json
//! {
//!   "plugins": {
//!     "obs-teleport": {
//!       "name": "Teleport",
//!       "author": "fzwoch",
//!       "versions": {
//!         "0.7.0": {
//!           "timestamp": "2023-11-04T10:00:00Z",
//!           "files": [
//!             { "os": "windows", "arch": ["x64"], "url": "https://...", "sha256": "..." }
//!           ]
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Version keys are kept in document order, newest first.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, OpmError, Result};
use crate::infer::infer_platform;
use crate::platform::{Arch, Os};

/// Read-only plugin catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEntry {
    pub name: String,
    #[serde(default)]
    pub author: String,
    /// Newest first
    #[serde(default)]
    pub versions: IndexMap<String, VersionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// One downloadable artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub os: Os,
    pub arch: Vec<Arch>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Version picked by [`PluginEntry::resolve_version`]
#[derive(Debug, Clone, Copy)]
pub struct ResolvedVersion<'a> {
    pub version: &'a str,
    pub entry: &'a VersionEntry,
    /// No version was requested and the newest one was chosen
    pub defaulted: bool,
}

/// Asset of a published release, as listed by a release page
#[derive(Debug, Clone)]
pub struct ReleaseAsset {
    pub name: String,
    pub url: String,
    pub sha256: Option<String>,
}

impl Repository {
    /// Load a manifest from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).at(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse a manifest from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        Self::parse(content, "<memory>")
    }

    fn parse(content: &str, source_name: &str) -> Result<Self> {
        let repo: Repository =
            serde_json::from_str(content).map_err(|e| OpmError::ManifestParse {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!("loaded {} plugins from {}", repo.plugins.len(), source_name);
        Ok(repo)
    }

    /// Look up a plugin by id
    pub fn plugin(&self, id: &str) -> Result<&PluginEntry> {
        self.plugins
            .get(id)
            .ok_or_else(|| OpmError::UnknownPlugin { id: id.to_string() })
    }

    /// Case-insensitive search over id, name and author
    pub fn search(&self, query: &str) -> Vec<(&str, &PluginEntry)> {
        let query = query.to_lowercase();
        self.plugins
            .iter()
            .filter(|(id, plugin)| {
                query.is_empty()
                    || id.to_lowercase().contains(&query)
                    || plugin.name.to_lowercase().contains(&query)
                    || plugin.author.to_lowercase().contains(&query)
            })
            .map(|(id, plugin)| (id.as_str(), plugin))
            .collect()
    }
}

impl PluginEntry {
    /// Resolve `requested`, or the newest declared version when `None`
    pub fn resolve_version(&self, requested: Option<&str>) -> Result<ResolvedVersion<'_>> {
        match requested {
            Some(version) => {
                let (key, entry) = self.versions.get_key_value(version).ok_or_else(|| {
                    OpmError::UnknownVersion {
                        plugin: self.name.clone(),
                        version: version.to_string(),
                    }
                })?;
                Ok(ResolvedVersion {
                    version: key,
                    entry,
                    defaulted: false,
                })
            }
            None => {
                let (key, entry) =
                    self.versions
                        .first()
                        .ok_or_else(|| OpmError::UnknownVersion {
                            plugin: self.name.clone(),
                            version: "<newest>".to_string(),
                        })?;
                Ok(ResolvedVersion {
                    version: key,
                    entry,
                    defaulted: true,
                })
            }
        }
    }

    /// Newest version satisfying `predicate`, scanning in declared order
    pub fn newest_matching<F>(&self, mut predicate: F) -> Option<(&str, &VersionEntry)>
    where
        F: FnMut(&VersionEntry) -> bool,
    {
        self.versions
            .iter()
            .find(|(_, entry)| predicate(entry))
            .map(|(key, entry)| (key.as_str(), entry))
    }
}

impl VersionEntry {
    /// Build a version entry from the assets of a release.
    ///
    /// Installer executables are skipped. Platforms are inferred from asset
    /// names; the names whose os or arch had to be guessed are returned
    /// alongside the entry so callers can review them.
    pub fn from_release(timestamp: &str, assets: &[ReleaseAsset]) -> (Self, Vec<String>) {
        let mut guessed = Vec::new();
        let files = assets
            .iter()
            .filter(|a| !a.name.to_lowercase().contains("installer"))
            .map(|asset| {
                let (os, arch) = infer_platform(&asset.name);
                if os.is_guessed() || arch.is_guessed() {
                    guessed.push(asset.name.clone());
                }
                FileEntry {
                    os: os.into_inner(),
                    arch: arch.into_inner(),
                    url: asset.url.clone(),
                    sha256: asset.sha256.clone(),
                }
            })
            .collect();

        (
            Self {
                timestamp: timestamp.to_string(),
                files,
            },
            guessed,
        )
    }
}
