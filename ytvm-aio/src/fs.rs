/*
File: ytvm-aio/src/fs.rs
Purpose: Staging directories, binary lookup and atomic installation.
*/
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder as TempBuilder, TempDir};
use tracing::{debug, error, warn};
use walkdir::WalkDir;
use ytvm_common::error::{Result, YtvmError};

/// Mode applied to installed executables on Unix.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Creates a uniquely named directory under `parent`. The directory and its
/// contents are removed when the returned guard is dropped.
pub fn create_staging_dir(parent: &Path, prefix: &str) -> Result<TempDir> {
    fs::create_dir_all(parent)?;
    let dir = TempBuilder::new().prefix(prefix).tempdir_in(parent).map_err(|e| {
        error!("Failed to create staging dir in {}: {}", parent.display(), e);
        YtvmError::InstallError(format!(
            "Failed to create staging directory in {}: {}",
            parent.display(),
            e
        ))
    })?;
    debug!("Created staging directory: {}", dir.path().display());
    Ok(dir)
}

/// Removes a staging directory, logging rather than failing on errors.
pub fn remove_staging_dir(dir: TempDir) {
    let path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => debug!("Removed staging directory: {}", path.display()),
        Err(e) => warn!(
            "Failed to remove staging directory {}: {}",
            path.display(),
            e
        ),
    }
}

/// Depth-first search for a regular file named exactly `target_name`.
///
/// Sibling order follows directory enumeration, so with several matches any
/// one of them may be returned.
pub fn find_file(root: &Path, target_name: &str) -> Option<PathBuf> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file() && entry.file_name() == target_name {
            debug!("Found {} at {}", target_name, entry.path().display());
            return Some(entry.into_path());
        }
    }
    None
}

/// Copies `source` to `dest` through a temporary file in `dest`'s directory
/// and renames it into place, so `dest` never holds a partial copy.
///
/// If the rename fails because another process already installed `dest`,
/// that installation is kept.
pub fn install_executable(source: &Path, dest: &Path) -> Result<()> {
    let install_dir = dest.parent().ok_or_else(|| {
        YtvmError::InstallError(format!("Install path {} has no parent", dest.display()))
    })?;
    let file_name = dest
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut temp = TempBuilder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(install_dir)
        .map_err(|e| {
            YtvmError::InstallError(format!(
                "Failed to create temporary file in {}: {}",
                install_dir.display(),
                e
            ))
        })?;

    let mut reader = File::open(source)?;
    let copied = io::copy(&mut reader, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    debug!(
        "Copied {} bytes from {} to {}",
        copied,
        source.display(),
        temp.path().display()
    );

    set_executable(temp.path())?;

    match temp.persist(dest) {
        Ok(_) => {
            debug!("Installed {}", dest.display());
            Ok(())
        }
        Err(e) if dest.exists() => {
            debug!(
                "Rename onto {} failed ({}), but it was installed concurrently",
                dest.display(),
                e.error
            );
            Ok(())
        }
        Err(e) => Err(YtvmError::InstallError(format!(
            "Failed to move {} into place at {}: {}",
            e.file.path().display(),
            dest.display(),
            e.error
        ))),
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(EXECUTABLE_MODE)).map_err(|e| {
        error!("Failed to set permissions on {}: {}", path.display(), e);
        YtvmError::from(e)
    })
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
