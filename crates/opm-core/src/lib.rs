pub mod config;
pub mod error;
pub mod fetch;
pub mod infer;
pub mod installer;
pub mod manager;
pub mod platform;
pub mod repository;
pub mod state;
pub mod verify;

pub use config::Config;
pub use error::{OpmError, Result};
pub use fetch::{Fetch, HttpFetcher, ProgressCallback};
pub use infer::{infer_arch, infer_os, infer_platform, normalize_version, Inferred};
pub use installer::{ArchiveInstaller, Destination, InstallReport};
pub use manager::{
    refresh_repository, AvailablePlugin, Context, InstallOutcome, InstalledSummary, PendingUpdate,
    PluginManager,
};
pub use platform::{select_file, Arch, ArchMatch, Os, Platform, Selection};
pub use repository::{FileEntry, PluginEntry, ReleaseAsset, Repository, ResolvedVersion, VersionEntry};
pub use state::{InstallStateStore, InstalledPlugin, VERSION_MARKER};
pub use verify::{verify, TrustPolicy, Verification, VerifiedBytes};
