//! Plugin Manager
//!
//! High-level API tying the pipeline together:
//! repository → platform selection → download → verification → install.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::error::{IoResultExt, OpmError, Result};
use crate::fetch::{Fetch, HttpFetcher, ProgressCallback};
use crate::installer::{validate_plugin_id, ArchiveInstaller, InstallReport};
use crate::platform::{is_compatible, select_file, ArchMatch, Platform};
use crate::repository::{PluginEntry, Repository};
use crate::state::{InstallStateStore, InstalledPlugin};
use crate::verify::{ensure_trusted, verify, TrustPolicy, Verification};

/// Everything a pipeline run depends on, built once at startup
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub repository: Repository,
    pub platform: Platform,
}

impl Context {
    pub fn new(config: Config, repository: Repository) -> Self {
        Self {
            config,
            repository,
            platform: Platform::current(),
        }
    }

    /// Load the repository manifest named by `config`
    pub fn load(config: Config) -> Result<Self> {
        let repository = Repository::load(&config.repository.path)?;
        Ok(Self::new(config, repository))
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

/// Outcome of a successful install
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// Display name from the repository
    pub name: String,
    pub version: String,
    /// The version was not requested; the newest one was picked
    pub version_defaulted: bool,
    pub arch_match: ArchMatch,
    pub verification: Verification,
    pub sha256: String,
    pub report: InstallReport,
}

/// Installed plugin joined with its repository metadata
#[derive(Debug, Clone)]
pub struct InstalledSummary {
    pub installed: InstalledPlugin,
    /// `None` when the plugin is not in the repository
    pub name: Option<String>,
    pub author: Option<String>,
}

/// An installed plugin with a newer compatible version available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub id: String,
    /// `None` when the installed version is unknown
    pub installed: Option<String>,
    pub latest: String,
}

/// Repository plugin installable on this platform
#[derive(Debug, Clone)]
pub struct AvailablePlugin<'a> {
    pub id: &'a str,
    pub entry: &'a PluginEntry,
    /// Newest version with a compatible artifact
    pub latest: &'a str,
    pub timestamp: &'a str,
    pub installed: Option<String>,
}

/// Plugin Manager - high-level API for plugin management
pub struct PluginManager<F: Fetch = HttpFetcher> {
    ctx: Context,
    fetcher: F,
    installer: ArchiveInstaller,
    state: InstallStateStore,
}

impl PluginManager<HttpFetcher> {
    /// Create a manager downloading over HTTP with the configured timeout
    pub fn new(ctx: Context) -> Result<Self> {
        let fetcher = HttpFetcher::new(Duration::from_secs(ctx.config.download.timeout_secs))?;
        Ok(Self::with_fetcher(ctx, fetcher))
    }
}

impl<F: Fetch> PluginManager<F> {
    pub fn with_fetcher(ctx: Context, fetcher: F) -> Self {
        let root = ctx.config.plugin_path.clone();
        Self {
            installer: ArchiveInstaller::new(root.clone()),
            state: InstallStateStore::new(root),
            ctx,
            fetcher,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn repository(&self) -> &Repository {
        &self.ctx.repository
    }

    pub fn state(&self) -> &InstallStateStore {
        &self.state
    }

    fn allow_fallback(&self) -> bool {
        self.ctx.config.install.allow_arch_fallback
    }

    /// Install `id` at `version` (newest when `None`)
    pub fn install(
        &self,
        id: &str,
        version: Option<&str>,
        policy: TrustPolicy,
        on_progress: ProgressCallback<'_>,
    ) -> Result<InstallOutcome> {
        validate_plugin_id(id)?;
        let plugin = self.ctx.repository.plugin(id)?;
        let resolved = plugin.resolve_version(version)?;
        if resolved.defaulted {
            tracing::info!(
                "no version specified for {}, defaulting to newest ({})",
                id,
                resolved.version
            );
        }

        let selection = select_file(resolved.entry, &self.ctx.platform, self.allow_fallback())
            .map_err(|e| match e {
                OpmError::NoCompatibleArtifact { platform, .. } => {
                    OpmError::NoCompatibleArtifact {
                        plugin: id.to_string(),
                        version: resolved.version.to_string(),
                        platform,
                    }
                }
                other => other,
            })?;
        let file = selection.file;
        let expected = file.sha256.as_deref();

        ensure_trusted(expected, policy, id, resolved.version)?;

        tracing::debug!("downloading {} {} from {}", id, resolved.version, file.url);
        let bytes = self.fetcher.fetch(&file.url, on_progress)?;
        let verified = verify(bytes, expected, policy, id, resolved.version)?;
        let sha256 = verified.sha256().to_string();
        let verification = verified.verification().clone();

        let report = self
            .installer
            .install(id, resolved.version, verified.bytes())?;
        tracing::info!(
            "installed {} {} into {}",
            id,
            resolved.version,
            report.path.display()
        );

        Ok(InstallOutcome {
            name: plugin.name.clone(),
            version: resolved.version.to_string(),
            version_defaulted: resolved.defaulted,
            arch_match: selection.arch_match,
            verification,
            sha256,
            report,
        })
    }

    /// Remove an installed plugin; returns its display name (id if unknown)
    pub fn uninstall(&self, id: &str) -> Result<String> {
        let path = self.installer.uninstall(id)?;
        tracing::info!("removed {}", path.display());
        Ok(self.display_name(id))
    }

    /// Display name of `id` from the repository, falling back to the id
    pub fn display_name(&self, id: &str) -> String {
        self.ctx
            .repository
            .plugins
            .get(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Installed plugins with repository metadata
    pub fn list_installed(&self) -> Result<Vec<InstalledSummary>> {
        let installed = self.state.list_installed()?;
        Ok(installed
            .into_iter()
            .map(|installed| {
                let entry = self.ctx.repository.plugins.get(&installed.id);
                InstalledSummary {
                    name: entry.map(|e| e.name.clone()),
                    author: entry.map(|e| e.author.clone()),
                    installed,
                }
            })
            .collect())
    }

    /// Newest version of `plugin` that can be installed on this platform
    fn latest_compatible<'a>(&self, plugin: &'a PluginEntry) -> Option<&'a str> {
        plugin
            .newest_matching(|v| is_compatible(v, &self.ctx.platform, self.allow_fallback()))
            .map(|(version, _)| version)
    }

    /// Installed plugins whose marker differs from the newest compatible version.
    ///
    /// Versions are compared for equality only; repository order decides
    /// which version is newest. Plugins not in the repository are skipped.
    pub fn pending_updates(&self, id: Option<&str>) -> Result<Vec<PendingUpdate>> {
        let installed = match id {
            Some(id) => {
                if !self.state.is_present(id) {
                    return Err(OpmError::NotInstalled { id: id.to_string() });
                }
                vec![InstalledPlugin {
                    id: id.to_string(),
                    version: self.state.installed_version(id)?,
                    path: self.state.plugin_dir(id),
                }]
            }
            // Unreadable markers are listed as unknown; don't queue those for reinstall
            None => self
                .state
                .list_installed()?
                .into_iter()
                .filter(|p| {
                    p.version.is_some()
                        || match self.state.installed_version(&p.id) {
                            Ok(_) => true,
                            Err(e) => {
                                tracing::warn!("skipping {}: {}", p.id, e);
                                false
                            }
                        }
                })
                .collect(),
        };

        let mut updates = Vec::new();
        for plugin in installed {
            let Some(entry) = self.ctx.repository.plugins.get(&plugin.id) else {
                tracing::debug!("{} is not in the repository, skipping", plugin.id);
                continue;
            };
            let Some(latest) = self.latest_compatible(entry) else {
                tracing::debug!("{} has no compatible version, skipping", plugin.id);
                continue;
            };
            if plugin.version.as_deref() != Some(latest) {
                updates.push(PendingUpdate {
                    id: plugin.id,
                    installed: plugin.version,
                    latest: latest.to_string(),
                });
            }
        }
        Ok(updates)
    }

    /// Plugins matching `query` that have an artifact for this platform
    pub fn available(&self, query: &str) -> Vec<AvailablePlugin<'_>> {
        self.ctx
            .repository
            .search(query)
            .into_iter()
            .filter_map(|(id, entry)| {
                let latest = self.latest_compatible(entry)?;
                let installed = self.state.installed_version(id).unwrap_or_else(|e| {
                    tracing::warn!("can't read installed version of {}: {}", id, e);
                    None
                });
                Some(AvailablePlugin {
                    id,
                    entry,
                    latest,
                    timestamp: entry.versions[latest].timestamp.as_str(),
                    installed,
                })
            })
            .collect()
    }
}

/// Download the manifest at `repository.url` and store it at `repository.path`.
///
/// The download is parsed before anything is written, so a broken remote
/// never replaces a working local copy.
pub fn refresh_repository<F: Fetch>(
    config: &Config,
    fetcher: &F,
    on_progress: ProgressCallback<'_>,
) -> Result<(PathBuf, Repository)> {
    let url = config
        .repository
        .url
        .as_deref()
        .ok_or_else(|| OpmError::ConfigKeyNotFound {
            key: "repository.url".to_string(),
        })?;

    let bytes = fetcher.fetch(url, on_progress)?;
    let content = String::from_utf8(bytes).map_err(|e| OpmError::ManifestParse {
        source_name: url.to_string(),
        message: e.to_string(),
    })?;
    let repository = Repository::from_json(&content).map_err(|e| match e {
        OpmError::ManifestParse { message, .. } => OpmError::ManifestParse {
            source_name: url.to_string(),
            message,
        },
        other => other,
    })?;

    let path = config.repository.path.clone();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    fs::write(&path, content).at(&path)?;
    tracing::info!("repository refreshed from {} ({} plugins)", url, repository.plugins.len());

    Ok((path, repository))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::build_zip;
    use crate::platform::{Arch, Os};
    use crate::state::VERSION_MARKER;
    use crate::verify::sha256_hex;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Serves canned bytes and records every requested url
    #[derive(Default)]
    struct FakeFetcher {
        responses: HashMap<String, Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn serve(mut self, url: &str, bytes: Vec<u8>) -> Self {
            self.responses.insert(url.to_string(), bytes);
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.borrow().clone()
        }
    }

    impl Fetch for FakeFetcher {
        fn fetch(&self, url: &str, on_progress: ProgressCallback<'_>) -> Result<Vec<u8>> {
            self.requests.borrow_mut().push(url.to_string());
            let bytes = self
                .responses
                .get(url)
                .cloned()
                .ok_or_else(|| OpmError::DownloadFailed {
                    url: url.to_string(),
                    message: "HTTP 404 Not Found".to_string(),
                })?;
            if let Some(f) = on_progress {
                f(bytes.len() as u64, Some(bytes.len() as u64));
            }
            Ok(bytes)
        }
    }

    fn archive(marker: &str) -> Vec<u8> {
        build_zip(&[
            ("obs-plugins/p1.dll", Some(marker.as_bytes())),
            ("data/obs-plugins/p1/locale/en-US.ini", Some(b"Name=P1")),
        ])
    }

    fn manifest(sha_v2: &str) -> String {
        format!(
            r#"{{
            "plugins": {{
                "p1": {{
                    "name": "Plugin One",
                    "author": "someone",
                    "versions": {{
                        "2.0": {{
                            "timestamp": "2024-02-01T00:00:00Z",
                            "files": [
                                {{ "os": "windows", "arch": ["x64"], "url": "https://dl/p1-2.0-win.zip", "sha256": "{sha}" }},
                                {{ "os": "linux", "arch": ["arm64"], "url": "https://dl/p1-2.0-linux.zip", "sha256": "{sha}" }}
                            ]
                        }},
                        "1.0": {{
                            "timestamp": "2023-01-01T00:00:00Z",
                            "files": [
                                {{ "os": "windows", "arch": ["x64"], "url": "https://dl/p1-1.0-win.zip" }}
                            ]
                        }}
                    }}
                }},
                "mac-only": {{
                    "name": "Mac Only",
                    "author": "apple fan",
                    "versions": {{
                        "1.0.0": {{
                            "timestamp": "2023-01-01T00:00:00Z",
                            "files": [ {{ "os": "mac", "arch": ["arm64"], "url": "https://dl/mac.zip" }} ]
                        }}
                    }}
                }}
            }}
        }}"#,
            sha = sha_v2
        )
    }

    fn create_test_manager(fetcher: FakeFetcher) -> (PluginManager<FakeFetcher>, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.plugin_path = temp.path().join("plugins");
        config.repository.path = temp.path().join("repo.json");

        let repository = Repository::from_json(&manifest(&sha256_hex(&archive("v2")))).unwrap();
        let ctx = Context::new(config, repository).with_platform(Platform::new(Os::Windows, Arch::X64));
        (PluginManager::with_fetcher(ctx, fetcher), temp)
    }

    fn standard_fetcher() -> FakeFetcher {
        FakeFetcher::default()
            .serve("https://dl/p1-2.0-win.zip", archive("v2"))
            .serve("https://dl/p1-1.0-win.zip", archive("v1"))
    }

    #[test]
    fn test_end_to_end_default_version() {
        let (manager, _temp) = create_test_manager(standard_fetcher());
        let progress = RefCell::new(0u64);
        let on_progress = |done: u64, _total: Option<u64>| *progress.borrow_mut() = done;

        let outcome = manager
            .install("p1", None, TrustPolicy::default(), Some(&on_progress))
            .unwrap();

        assert_eq!(outcome.name, "Plugin One");
        assert_eq!(outcome.version, "2.0");
        assert!(outcome.version_defaulted);
        assert_eq!(outcome.arch_match, ArchMatch::Exact);
        assert_eq!(outcome.verification, Verification::Verified);
        assert_eq!(outcome.sha256, sha256_hex(&archive("v2")));
        assert_eq!(*progress.borrow(), archive("v2").len() as u64);

        assert_eq!(manager.state().read_installed_version("p1").unwrap(), "2.0");
        let dir = manager.state().plugin_dir("p1");
        assert_eq!(fs::read(dir.join("bin/p1.dll")).unwrap(), b"v2");
        assert!(dir.join("data/locale/en-US.ini").exists());
        assert_eq!(
            manager.fetcher.requests(),
            vec!["https://dl/p1-2.0-win.zip".to_string()]
        );
    }

    #[test]
    fn test_checksum_mismatch_leaves_filesystem_untouched() {
        let fetcher = FakeFetcher::default().serve("https://dl/p1-2.0-win.zip", archive("tampered"));
        let (manager, _temp) = create_test_manager(fetcher);

        let err = manager
            .install("p1", Some("2.0"), TrustPolicy::default(), None)
            .unwrap_err();
        assert!(matches!(err, OpmError::ChecksumMismatch { .. }));
        assert!(!manager.context().config.plugin_path.exists());
    }

    #[test]
    fn test_checksum_mismatch_keeps_previous_install() {
        let (manager, _temp) = create_test_manager(standard_fetcher());
        manager
            .install("p1", Some("1.0"), TrustPolicy::AllowUnverified, None)
            .unwrap();

        let tampered = FakeFetcher::default().serve("https://dl/p1-2.0-win.zip", archive("tampered"));
        let manager = PluginManager::with_fetcher(manager.ctx, tampered);
        let err = manager
            .install("p1", None, TrustPolicy::default(), None)
            .unwrap_err();

        assert!(err.is_refusal());
        assert_eq!(manager.state().read_installed_version("p1").unwrap(), "1.0");
        let dll = manager.state().plugin_dir("p1").join("bin/p1.dll");
        assert_eq!(fs::read(dll).unwrap(), b"v1");
    }

    #[test]
    fn test_untrusted_artifact_refused_before_download() {
        let (manager, _temp) = create_test_manager(standard_fetcher());

        let err = manager
            .install("p1", Some("1.0"), TrustPolicy::RequireChecksum, None)
            .unwrap_err();
        assert!(matches!(err, OpmError::UntrustedArtifact { .. }));
        assert!(manager.fetcher.requests().is_empty());
    }

    #[test]
    fn test_untrusted_install_is_tagged() {
        let (manager, _temp) = create_test_manager(standard_fetcher());

        let outcome = manager
            .install("p1", Some("1.0"), TrustPolicy::AllowUnverified, None)
            .unwrap();
        assert!(!outcome.version_defaulted);
        assert_eq!(outcome.verification, Verification::Unverified);
        assert_eq!(manager.state().read_installed_version("p1").unwrap(), "1.0");
    }

    #[test]
    fn test_resolution_errors() {
        let (manager, _temp) = create_test_manager(standard_fetcher());

        assert!(matches!(
            manager.install("nope", None, TrustPolicy::default(), None),
            Err(OpmError::UnknownPlugin { .. })
        ));
        assert!(matches!(
            manager.install("p1", Some("3.0"), TrustPolicy::default(), None),
            Err(OpmError::UnknownVersion { .. })
        ));
        match manager.install("mac-only", None, TrustPolicy::default(), None) {
            Err(OpmError::NoCompatibleArtifact {
                plugin,
                version,
                platform,
            }) => {
                assert_eq!(plugin, "mac-only");
                assert_eq!(version, "1.0.0");
                assert_eq!(platform, "windows/x64");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(manager.fetcher.requests().is_empty());
    }

    #[test]
    fn test_download_failure() {
        let (manager, _temp) = create_test_manager(FakeFetcher::default());
        let err = manager
            .install("p1", None, TrustPolicy::default(), None)
            .unwrap_err();
        assert!(matches!(err, OpmError::DownloadFailed { .. }));
    }

    #[test]
    fn test_arch_fallback() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.plugin_path = temp.path().join("plugins");
        let repository = Repository::from_json(&manifest(&sha256_hex(&archive("v2")))).unwrap();
        let ctx = Context::new(config, repository).with_platform(Platform::new(Os::Linux, Arch::X64));
        let fetcher = FakeFetcher::default().serve("https://dl/p1-2.0-linux.zip", archive("v2"));
        let manager = PluginManager::with_fetcher(ctx, fetcher);

        let outcome = manager
            .install("p1", None, TrustPolicy::default(), None)
            .unwrap();
        assert_eq!(outcome.arch_match, ArchMatch::Fallback);

        let mut ctx = manager.ctx;
        ctx.config.install.allow_arch_fallback = false;
        let manager = PluginManager::with_fetcher(ctx, FakeFetcher::default());
        assert!(matches!(
            manager.install("p1", None, TrustPolicy::default(), None),
            Err(OpmError::NoCompatibleArtifact { .. })
        ));
    }

    #[test]
    fn test_list_installed_joins_repository() {
        let (manager, _temp) = create_test_manager(standard_fetcher());
        manager
            .install("p1", None, TrustPolicy::default(), None)
            .unwrap();
        fs::create_dir_all(manager.state().plugin_dir("hand-made")).unwrap();

        let list = manager.list_installed().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].installed.id, "hand-made");
        assert_eq!(list[0].name, None);
        assert_eq!(list[0].installed.version, None);
        assert_eq!(list[1].name.as_deref(), Some("Plugin One"));
        assert_eq!(list[1].author.as_deref(), Some("someone"));
        assert_eq!(list[1].installed.version.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_uninstall() {
        let (manager, _temp) = create_test_manager(standard_fetcher());
        manager
            .install("p1", None, TrustPolicy::default(), None)
            .unwrap();

        assert_eq!(manager.uninstall("p1").unwrap(), "Plugin One");
        assert!(!manager.state().is_present("p1"));
        assert!(matches!(
            manager.uninstall("p1"),
            Err(OpmError::NotInstalled { .. })
        ));
    }

    #[test]
    fn test_pending_updates() {
        let (manager, _temp) = create_test_manager(standard_fetcher());
        manager
            .install("p1", Some("1.0"), TrustPolicy::AllowUnverified, None)
            .unwrap();
        fs::create_dir_all(manager.state().plugin_dir("not-in-repo")).unwrap();

        let updates = manager.pending_updates(None).unwrap();
        assert_eq!(
            updates,
            vec![PendingUpdate {
                id: "p1".to_string(),
                installed: Some("1.0".to_string()),
                latest: "2.0".to_string(),
            }]
        );

        manager
            .install("p1", Some(updates[0].latest.as_str()), TrustPolicy::default(), None)
            .unwrap();
        assert!(manager.pending_updates(None).unwrap().is_empty());
        assert!(manager.pending_updates(Some("p1")).unwrap().is_empty());
        assert!(matches!(
            manager.pending_updates(Some("missing")),
            Err(OpmError::NotInstalled { .. })
        ));
    }

    #[test]
    fn test_pending_update_for_unknown_version() {
        let (manager, _temp) = create_test_manager(standard_fetcher());
        let dir = manager.state().plugin_dir("p1");
        fs::create_dir_all(&dir).unwrap();
        assert!(!dir.join(VERSION_MARKER).exists());

        let updates = manager.pending_updates(Some("p1")).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].installed, None);
        assert_eq!(updates[0].latest, "2.0");
    }

    #[test]
    fn test_pending_update_propagates_unreadable_marker() {
        let (manager, _temp) = create_test_manager(standard_fetcher());
        let dir = manager.state().plugin_dir("p1");
        fs::create_dir_all(dir.join(VERSION_MARKER)).unwrap();

        assert!(matches!(
            manager.pending_updates(Some("p1")),
            Err(OpmError::Filesystem { .. })
        ));
        // Listing everything skips the plugin instead of queueing a reinstall
        assert!(manager.pending_updates(None).unwrap().is_empty());

        let available = manager.available("p1");
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].installed, None);
    }

    #[test]
    fn test_invalid_id_rejected_before_download() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.plugin_path = temp.path().join("plugins");
        let json = r#"{"plugins": {"../evil": {"name": "Evil", "versions": {"1.0": {"files": [
            {"os": "windows", "arch": ["x64"], "url": "https://dl/evil.zip", "sha256": "00"}
        ]}}}}}"#;
        let ctx = Context::new(config, Repository::from_json(json).unwrap())
            .with_platform(Platform::new(Os::Windows, Arch::X64));
        let fetcher = FakeFetcher::default().serve("https://dl/evil.zip", archive("x"));
        let manager = PluginManager::with_fetcher(ctx, fetcher);

        let err = manager
            .install("../evil", None, TrustPolicy::default(), None)
            .unwrap_err();
        assert!(matches!(err, OpmError::InvalidPluginId { .. }));
        assert!(manager.fetcher.requests().is_empty());
    }

    #[test]
    fn test_available_hides_incompatible() {
        let (manager, _temp) = create_test_manager(standard_fetcher());

        let available = manager.available("");
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, "p1");
        assert_eq!(available[0].latest, "2.0");
        assert_eq!(available[0].timestamp, "2024-02-01T00:00:00Z");
        assert_eq!(available[0].installed, None);

        assert!(manager.available("mac").is_empty());
    }

    #[test]
    fn test_refresh_repository() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.repository.path = temp.path().join("cache/repo.json");
        config.repository.url = Some("https://repo/manifest.json".to_string());

        let broken = FakeFetcher::default().serve("https://repo/manifest.json", b"{oops".to_vec());
        assert!(matches!(
            refresh_repository(&config, &broken, None),
            Err(OpmError::ManifestParse { ref source_name, .. }) if source_name == "https://repo/manifest.json"
        ));
        assert!(!config.repository.path.exists());

        let good = FakeFetcher::default()
            .serve("https://repo/manifest.json", manifest("00").into_bytes());
        let (path, repository) = refresh_repository(&config, &good, None).unwrap();
        assert_eq!(path, config.repository.path);
        assert_eq!(repository.plugins.len(), 2);
        assert_eq!(Repository::load(&path).unwrap().plugins.len(), 2);

        config.repository.url = None;
        assert!(matches!(
            refresh_repository(&config, &good, None),
            Err(OpmError::ConfigKeyNotFound { .. })
        ));
    }
}
