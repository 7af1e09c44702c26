//! Best-effort platform and version inference from release names
//!
//! Release pages rarely describe artifacts in a structured way, so the os,
//! architectures and version of an asset are guessed from its name. The
//! rules are ordered tables; the first OS rule that matches wins, arch rules
//! are applied in sequence so later replacing rules take precedence.
//!
//! Inference never fails. When nothing matches, a documented default is
//! returned as [`Inferred::Guessed`] and a warning is logged.

use crate::platform::{Arch, Os};

/// A value read from a name, or a default used because nothing matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inferred<T> {
    Declared(T),
    Guessed(T),
}

impl<T> Inferred<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Declared(v) | Self::Guessed(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Declared(v) | Self::Guessed(v) => v,
        }
    }

    pub fn is_guessed(&self) -> bool {
        matches!(self, Self::Guessed(_))
    }
}

const DEFAULT_OS: Os = Os::Windows;
const DEFAULT_ARCH: Arch = Arch::X64;

/// Substring marker → OS, first match wins
const OS_RULES: &[(&str, Os)] = &[
    ("win", Os::Windows),
    ("linux", Os::Linux),
    (".deb", Os::Linux),
    (".tar.gz", Os::Linux),
    ("mac", Os::Mac),
    (".pkg", Os::Mac),
];

#[derive(Debug, Clone, Copy)]
enum ArchRule {
    /// Add the arch to the collected set
    Add(&'static str, Arch),
    /// Replace the whole set
    Replace(&'static str, &'static [Arch]),
    /// Replace the whole set, only for artifacts of the given OS
    ReplaceOn(&'static str, Os, &'static [Arch]),
}

const ALL_ARCHES: &[Arch] = &[Arch::X64, Arch::X86, Arch::Arm64];

const ARCH_RULES: &[ArchRule] = &[
    ArchRule::Add("x64", Arch::X64),
    ArchRule::Add("x86", Arch::X86),
    ArchRule::Add("x32", Arch::X86),
    ArchRule::Replace("x86_64", &[Arch::X64]),
    ArchRule::Replace("arm64", &[Arch::Arm64]),
    ArchRule::ReplaceOn("universal", Os::Mac, ALL_ARCHES),
];

/// Infer the target OS of an archive from its file name
pub fn infer_os(name: &str) -> Inferred<Os> {
    let name = name.to_lowercase();
    match OS_RULES.iter().find(|(marker, _)| name.contains(marker)) {
        Some((_, os)) => Inferred::Declared(*os),
        None => {
            tracing::warn!("can't guess OS from name {}, defaulting to {}", name, DEFAULT_OS);
            Inferred::Guessed(DEFAULT_OS)
        }
    }
}

/// Infer the architectures of an archive built for `os` from its file name
pub fn infer_arch(name: &str, os: Os) -> Inferred<Vec<Arch>> {
    let name = name.to_lowercase();
    let mut arch: Vec<Arch> = Vec::new();

    for rule in ARCH_RULES {
        match *rule {
            ArchRule::Add(marker, a) if name.contains(marker) => {
                if !arch.contains(&a) {
                    arch.push(a);
                }
            }
            ArchRule::Replace(marker, set) if name.contains(marker) => {
                arch = set.to_vec();
            }
            ArchRule::ReplaceOn(marker, rule_os, set) if rule_os == os && name.contains(marker) => {
                arch = set.to_vec();
            }
            _ => {}
        }
    }

    if arch.is_empty() {
        tracing::warn!(
            "can't guess architecture from name {}, defaulting to {}",
            name,
            DEFAULT_ARCH
        );
        return Inferred::Guessed(vec![DEFAULT_ARCH]);
    }
    Inferred::Declared(arch)
}

/// Infer both os and architectures; the arch rules see the inferred OS
pub fn infer_platform(name: &str) -> (Inferred<Os>, Inferred<Vec<Arch>>) {
    let os = infer_os(name);
    let arch = infer_arch(name, *os.value());
    (os, arch)
}

/// Turn a release name into a version string.
///
/// Everything but digits and dots is dropped; a two-component result gets a
/// `.0` patch component. The mapping is lossy and does not give a reliable
/// ordering between versions.
pub fn normalize_version(name: &str) -> String {
    let mut version: String = name
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if version.matches('.').count() == 1 {
        version.push_str(".0");
    }
    version
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_markers() {
        assert_eq!(infer_os("MyPlugin-2.1.0-x64-win.zip"), Inferred::Declared(Os::Windows));
        assert_eq!(infer_os("plugin.tar.gz"), Inferred::Declared(Os::Linux));
        assert_eq!(infer_os("plugin_1.0_amd64.deb"), Inferred::Declared(Os::Linux));
        assert_eq!(infer_os("plugin-macos.zip"), Inferred::Declared(Os::Mac));
        assert_eq!(infer_os("plugin_universal.pkg"), Inferred::Declared(Os::Mac));
    }

    #[test]
    fn os_first_rule_wins() {
        // "win" is checked before "linux"
        assert_eq!(infer_os("plugin-win-linux.zip"), Inferred::Declared(Os::Windows));
    }

    #[test]
    fn os_defaults_to_windows() {
        let os = infer_os("plugin.zip");
        assert!(os.is_guessed());
        assert_eq!(os.into_inner(), Os::Windows);
    }

    #[test]
    fn arch_additive_markers() {
        assert_eq!(
            infer_arch("plugin-x64-x86.zip", Os::Windows),
            Inferred::Declared(vec![Arch::X64, Arch::X86])
        );
        assert_eq!(
            infer_arch("plugin-x86-x32.zip", Os::Windows),
            Inferred::Declared(vec![Arch::X86])
        );
    }

    #[test]
    fn arch_explicit_markers_replace_set() {
        assert_eq!(
            infer_arch("plugin-x86_64-linux.tar.gz", Os::Linux),
            Inferred::Declared(vec![Arch::X64])
        );
        assert_eq!(
            infer_arch("plugin-x64-arm64.zip", Os::Windows),
            Inferred::Declared(vec![Arch::Arm64])
        );
    }

    #[test]
    fn universal_only_applies_to_mac() {
        let (os, arch) = infer_platform("plugin_universal.pkg");
        assert_eq!(os.into_inner(), Os::Mac);
        assert_eq!(arch, Inferred::Declared(vec![Arch::X64, Arch::X86, Arch::Arm64]));

        let arch = infer_arch("plugin_universal.zip", Os::Windows);
        assert_eq!(arch, Inferred::Guessed(vec![Arch::X64]));
    }

    #[test]
    fn release_filename_examples() {
        let (os, arch) = infer_platform("MyPlugin-2.1.0-x64-win.zip");
        assert_eq!(os.into_inner(), Os::Windows);
        assert_eq!(arch.into_inner(), vec![Arch::X64]);

        let (os, _) = infer_platform("plugin.tar.gz");
        assert_eq!(os.into_inner(), Os::Linux);
    }

    #[test]
    fn arch_defaults_to_x64() {
        let arch = infer_arch("plugin-linux.tar.gz", Os::Linux);
        assert!(arch.is_guessed());
        assert_eq!(arch.value(), &vec![Arch::X64]);
    }

    #[test]
    fn version_normalization() {
        assert_eq!(normalize_version("v2.1"), "2.1.0");
        assert_eq!(normalize_version("Release 3"), "3");
        assert_eq!(normalize_version("Version 1.2.3"), "1.2.3");
        assert_eq!(normalize_version("no digits"), "");
    }
}
