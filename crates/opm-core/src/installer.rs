//! Archive installer
//!
//! Unpacks a plugin zip into the layout OBS loads plugins from:
//!
//! ```text
//! <plugin_root>/<id>/bin/...        <- archive "obs-plugins/..."
//! <plugin_root>/<id>/data/...       <- archive "data/obs-plugins/<id>/..."
//! <plugin_root>/<id>/version.txt
//! ```
//!
//! The archive is fully planned before the filesystem is touched, then
//! extracted into a scratch directory next to the target and swapped in, so a
//! failed install leaves the previous one in place.

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;
use zip::ZipArchive;

use crate::error::{IoResultExt, OpmError, Result};
use crate::state::{write_marker, SCRATCH_PREFIX};

pub const BIN_DIR: &str = "bin";
pub const DATA_DIR: &str = "data";

const BIN_PREFIX: &str = "obs-plugins/";
const DATA_PREFIX: &str = "data/obs-plugins/";
const COPY_BUFFER: usize = 32 * 1024;

/// Which plugin subdirectory an archive entry lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Bin,
    Data,
}

impl Destination {
    fn dir_name(&self) -> &'static str {
        match self {
            Self::Bin => BIN_DIR,
            Self::Data => DATA_DIR,
        }
    }
}

#[derive(Debug)]
struct PlannedEntry {
    index: usize,
    destination: Destination,
    relative: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub plugin_id: String,
    pub version: String,
    pub path: PathBuf,
    pub bin_files: usize,
    pub data_files: usize,
    /// File entries outside both plugin prefixes
    pub dropped: usize,
}

/// Installs and removes plugin directories under a plugin root
#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    plugin_root: PathBuf,
}

impl ArchiveInstaller {
    pub fn new(plugin_root: PathBuf) -> Self {
        Self { plugin_root }
    }

    pub fn plugin_root(&self) -> &Path {
        &self.plugin_root
    }

    /// Replace the installation of `plugin_id` with the content of `archive`
    pub fn install(&self, plugin_id: &str, version: &str, archive: &[u8]) -> Result<InstallReport> {
        validate_plugin_id(plugin_id)?;

        let mut zip = ZipArchive::new(Cursor::new(archive)).map_err(corrupt)?;
        let (plan, dropped) = plan_entries(&mut zip, plugin_id)?;
        tracing::debug!(
            "{}: {} entries to extract, {} dropped",
            plugin_id,
            plan.len(),
            dropped
        );

        fs::create_dir_all(&self.plugin_root).at(&self.plugin_root)?;
        let target = self.plugin_root.join(plugin_id);
        let staging = self.scratch_dir("staging", plugin_id);

        let extracted = extract_into(&mut zip, &plan, &staging)
            .and_then(|()| write_marker(&staging, version));
        if let Err(e) = extracted {
            remove_dir_if_exists(&staging).ok();
            return Err(e);
        }

        if let Err(e) = self.swap_into_place(&staging, &target, plugin_id) {
            remove_dir_if_exists(&staging).ok();
            return Err(e);
        }

        let bin_files = plan
            .iter()
            .filter(|p| p.destination == Destination::Bin)
            .count();
        Ok(InstallReport {
            plugin_id: plugin_id.to_string(),
            version: version.to_string(),
            path: target,
            bin_files,
            data_files: plan.len() - bin_files,
            dropped,
        })
    }

    /// Remove the directory of `plugin_id`
    pub fn uninstall(&self, plugin_id: &str) -> Result<PathBuf> {
        validate_plugin_id(plugin_id)?;
        let target = self.plugin_root.join(plugin_id);
        if !target.is_dir() {
            return Err(OpmError::NotInstalled {
                id: plugin_id.to_string(),
            });
        }
        remove_dir_if_exists(&target)?;
        Ok(target)
    }

    fn scratch_dir(&self, kind: &str, plugin_id: &str) -> PathBuf {
        self.plugin_root.join(format!(
            "{}{}-{}-{}",
            SCRATCH_PREFIX,
            kind,
            plugin_id,
            Uuid::new_v4().simple()
        ))
    }

    fn swap_into_place(&self, staging: &Path, target: &Path, plugin_id: &str) -> Result<()> {
        let backup = if target.exists() {
            let backup = self.scratch_dir("old", plugin_id);
            fs::rename(target, &backup).at(target)?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(staging, target) {
            if let Some(backup) = &backup {
                if let Err(restore) = fs::rename(backup, target) {
                    tracing::error!(
                        "could not restore {} from {}: {}",
                        target.display(),
                        backup.display(),
                        restore
                    );
                }
            }
            return Err(OpmError::Filesystem {
                path: target.to_path_buf(),
                source: e,
            });
        }

        if let Some(backup) = backup {
            if let Err(e) = remove_dir_if_exists(&backup) {
                tracing::warn!("previous installation left at {}: {}", backup.display(), e);
            }
        }
        Ok(())
    }
}

/// Reject ids that would not name a single directory under the plugin root
pub fn validate_plugin_id(id: &str) -> Result<()> {
    let mut components = Path::new(id).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(c)) if c == id)
        && components.next().is_none();

    if !single_normal || id.contains(['/', '\\']) || id.starts_with(SCRATCH_PREFIX) {
        return Err(OpmError::InvalidPluginId { id: id.to_string() });
    }
    Ok(())
}

/// Map an archive path to its destination and the path below it.
///
/// `None` for paths outside both plugin prefixes, and for the prefix
/// directories themselves.
pub fn map_entry(name: &str, plugin_id: &str) -> Option<(Destination, String)> {
    let name = name.replace('\\', "/");

    let data_rest = name
        .strip_prefix(DATA_PREFIX)
        .and_then(|rest| rest.strip_prefix(plugin_id))
        .and_then(|rest| rest.strip_prefix('/'));

    let (destination, rest) = match data_rest {
        Some(rest) => (Destination::Data, rest),
        None => (Destination::Bin, name.strip_prefix(BIN_PREFIX)?),
    };

    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        return None;
    }
    Some((destination, rest.to_string()))
}

fn plan_entries<R: io::Read + io::Seek>(
    zip: &mut ZipArchive<R>,
    plugin_id: &str,
) -> Result<(Vec<PlannedEntry>, usize)> {
    let mut plan = Vec::new();
    let mut dropped = 0;

    for index in 0..zip.len() {
        let entry = zip.by_index(index).map_err(corrupt)?;
        if entry.is_dir() {
            continue;
        }
        match map_entry(entry.name(), plugin_id) {
            Some((destination, rest)) => plan.push(PlannedEntry {
                index,
                destination,
                relative: sanitize_relative(&rest)?,
            }),
            None => {
                tracing::debug!("dropping archive entry {}", entry.name());
                dropped += 1;
            }
        }
    }

    Ok((plan, dropped))
}

/// Keep only normal components; anything escaping the destination is corrupt
fn sanitize_relative(rest: &str) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(rest).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(OpmError::CorruptArchive {
                    message: format!("entry escapes plugin directory: {}", rest),
                })
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(OpmError::CorruptArchive {
            message: format!("empty entry path: {}", rest),
        });
    }
    Ok(out)
}

fn extract_into<R: io::Read + io::Seek>(
    zip: &mut ZipArchive<R>,
    plan: &[PlannedEntry],
    staging: &Path,
) -> Result<()> {
    for dir in [BIN_DIR, DATA_DIR] {
        let dir = staging.join(dir);
        fs::create_dir_all(&dir).at(&dir)?;
    }

    for planned in plan {
        let mut entry = zip.by_index(planned.index).map_err(corrupt)?;
        let out = staging
            .join(planned.destination.dir_name())
            .join(&planned.relative);
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }

        let mut file = fs::File::create(&out).at(&out)?;
        let name = entry.name().to_string();
        copy_entry(&mut entry, &name, &mut file, &out)?;
    }
    Ok(())
}

/// Copy one archive entry to `file`.
///
/// Read errors come from decompression or CRC checks and mean the archive is
/// corrupt; only write errors are filesystem failures.
fn copy_entry<R: Read, W: Write>(
    entry: &mut R,
    name: &str,
    file: &mut W,
    out: &Path,
) -> Result<()> {
    let mut buf = [0u8; COPY_BUFFER];
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(OpmError::CorruptArchive {
                    message: format!("{}: {}", name, e),
                })
            }
        };
        file.write_all(&buf[..n]).at(out)?;
    }
}

/// Remove a directory tree; a missing directory counts as removed
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(OpmError::Filesystem {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn corrupt(e: zip::result::ZipError) -> OpmError {
    OpmError::CorruptArchive {
        message: e.to_string(),
    }
}

/// Build a zip in memory; `None` content adds a directory entry
#[cfg(test)]
pub(crate) fn build_zip(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        match content {
            Some(data) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            None => writer.add_directory(*name, options).unwrap(),
        }
    }
    writer.finish().unwrap().into_inner()
}
