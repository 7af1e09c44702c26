use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpmError {
    #[error("Plugin {id} not in repository")]
    UnknownPlugin { id: String },

    #[error("Version {version} of {plugin} not available")]
    UnknownVersion { plugin: String, version: String },

    #[error("No artifact of {plugin} {version} is compatible with {platform}")]
    NoCompatibleArtifact {
        plugin: String,
        version: String,
        platform: String,
    },

    #[error("Download of {url} failed: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Checksum {actual} invalid, expected checksum {expected}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("No checksum for {plugin} {version}, download cannot be verified (use --untrusted to proceed anyway)")]
    UntrustedArtifact { plugin: String, version: String },

    #[error("Corrupt plugin archive: {message}")]
    CorruptArchive { message: String },

    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Plugin {id} not installed")]
    NotInstalled { id: String },

    #[error("Invalid plugin id: '{id}' - must be a single directory name")]
    InvalidPluginId { id: String },

    #[error("Plugin directory doesn't exist or is misconfigured: {path}")]
    PluginRootNotFound { path: PathBuf },

    #[error("Failed to parse repository manifest {source_name}: {message}")]
    ManifestParse {
        source_name: String,
        message: String,
    },

    #[error("Failed to parse config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    ConfigValue { key: String, message: String },

    #[error("Unknown config key: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OpmError>;

impl OpmError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownPlugin { .. } | Self::UnknownVersion { .. } => 2,
            Self::NoCompatibleArtifact { .. } => 3,
            Self::DownloadFailed { .. } => 4,
            Self::ChecksumMismatch { .. } | Self::UntrustedArtifact { .. } => 5,
            Self::CorruptArchive { .. } => 6,
            Self::NotInstalled { .. } => 7,
            Self::PluginRootNotFound { .. } => 8,
            _ => 1,
        }
    }

    /// Whether the operation was refused for trust reasons rather than failing.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. } | Self::UntrustedArtifact { .. }
        )
    }
}

/// Attach the offending path to an I/O error.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| OpmError::Filesystem {
            path: path.to_path_buf(),
            source,
        })
    }
}
