//! Platform model and artifact selection
//!
//! A version in the repository ships one file per OS/architecture combination.
//! This module decides which of them the running host should download.

use serde::{Deserialize, Serialize};

use crate::error::{OpmError, Result};
use crate::repository::{FileEntry, VersionEntry};

/// Operating systems a plugin artifact can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Linux,
    Mac,
}

impl Os {
    /// OS of the running process, if it is one OBS ships plugins for
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Self::Mac)
        } else {
            None
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Mac => "mac",
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" | "win" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            "mac" | "macos" | "darwin" => Ok(Self::Mac),
            _ => Err(format!("Unknown os: {}", s)),
        }
    }
}

/// CPU architecture tags used in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X64,
    X86,
    Arm64,
}

impl Arch {
    /// Architecture of the running process
    pub fn current() -> Option<Self> {
        Self::from_rust_arch(std::env::consts::ARCH)
    }

    /// Map a Rust target architecture name to a manifest tag
    pub fn from_rust_arch(arch: &str) -> Option<Self> {
        match arch {
            "x86_64" => Some(Self::X64),
            "x86" => Some(Self::X86),
            "aarch64" => Some(Self::Arm64),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::X86 => "x86",
            Self::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Ok(Self::X64),
            "x86" | "i686" => Ok(Self::X86),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            _ => Err(format!("Unknown arch: {}", s)),
        }
    }
}

/// Host platform the pipeline installs for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Option<Os>,
    pub arch: Option<Arch>,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self {
            os: Some(os),
            arch: Some(arch),
        }
    }

    /// Detect the platform of the running process
    pub fn current() -> Self {
        Self {
            os: Os::current(),
            arch: Arch::current(),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let os = self.os.map(|o| o.id()).unwrap_or(std::env::consts::OS);
        let arch = self.arch.map(|a| a.id()).unwrap_or(std::env::consts::ARCH);
        write!(f, "{}/{}", os, arch)
    }
}

/// How the selected file matched the runtime architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchMatch {
    /// The file declares the runtime architecture
    Exact,
    /// No file declares it; the first file for the OS was taken instead
    Fallback,
}

/// Result of [`select_file`]
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub file: &'a FileEntry,
    pub arch_match: ArchMatch,
}

/// Pick the artifact of `version` to install on `platform`.
///
/// Files are scanned in declared order and the first one matching wins, so a
/// manifest listing two files for the same os/arch always resolves to the
/// earlier one. When no file declares the runtime architecture and
/// `allow_fallback` is set, the first file for the OS is used and the
/// selection is tagged [`ArchMatch::Fallback`].
///
/// The error carries empty plugin/version fields; callers fill them in.
pub fn select_file<'a>(
    version: &'a VersionEntry,
    platform: &Platform,
    allow_fallback: bool,
) -> Result<Selection<'a>> {
    let no_match = || OpmError::NoCompatibleArtifact {
        plugin: String::new(),
        version: String::new(),
        platform: platform.to_string(),
    };

    let os = platform.os.ok_or_else(no_match)?;
    let mut candidates = version.files.iter().filter(|f| f.os == os).peekable();
    let first = *candidates.peek().ok_or_else(no_match)?;

    if let Some(arch) = platform.arch {
        if let Some(file) = candidates.find(|f| f.arch.contains(&arch)) {
            return Ok(Selection {
                file,
                arch_match: ArchMatch::Exact,
            });
        }
    }

    if !allow_fallback {
        return Err(no_match());
    }

    tracing::warn!(
        "no {} artifact declares {}, falling back to {}",
        os,
        platform,
        first.url
    );
    Ok(Selection {
        file: first,
        arch_match: ArchMatch::Fallback,
    })
}

/// Whether `version` has any artifact installable on `platform`
pub fn is_compatible(version: &VersionEntry, platform: &Platform, allow_fallback: bool) -> bool {
    platform.os.is_some_and(|os| {
        version.files.iter().any(|f| {
            f.os == os && (allow_fallback || platform.arch.is_some_and(|a| f.arch.contains(&a)))
        })
    })
}
