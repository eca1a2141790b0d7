// ytvm-aio/src/extract.rs
// Handles release archive extraction. Decoding runs on the blocking pool.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, error};
use ytvm_common::error::{Result, YtvmError};
use ytvm_common::platform::ArchiveFormat;
use zip::ZipArchive;

use crate::cancel::CancelFlag;

/// Extracts `archive_path` (of the declared `format`) into `target_dir`,
/// overwriting entries that already exist there.
///
/// `cancel` is checked before every entry; once set, extraction stops with
/// an `ExtractionError` and nothing further is written. The returned future
/// completes only after the blocking task has stopped.
pub async fn extract_archive(
    archive_path: &Path,
    format: ArchiveFormat,
    target_dir: &Path,
    cancel: &CancelFlag,
) -> Result<()> {
    debug!(
        "Extracting archive '{}' (type: {}) to '{}'",
        archive_path.display(),
        format,
        target_dir.display()
    );

    let archive_path = archive_path.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || {
        fs::create_dir_all(&target_dir).map_err(|e| {
            YtvmError::ExtractionError(format!(
                "Failed to create extraction directory {}: {}",
                target_dir.display(),
                e
            ))
        })?;
        match format {
            ArchiveFormat::TarGz => extract_tar_gz(&archive_path, &target_dir, &cancel),
            ArchiveFormat::Zip => extract_zip(&archive_path, &target_dir, &cancel),
        }
    })
    .await
    .map_err(|e| YtvmError::ExtractionError(format!("JoinError in archive extraction: {e}")))?
}

fn check_cancelled(cancel: &CancelFlag, archive_path: &Path) -> Result<()> {
    if cancel.is_cancelled() {
        debug!("Extraction of {} cancelled", archive_path.display());
        return Err(YtvmError::ExtractionError(format!(
            "Extraction of {} cancelled",
            archive_path.display()
        )));
    }
    Ok(())
}

fn open_archive(archive_path: &Path) -> Result<BufReader<File>> {
    File::open(archive_path).map(BufReader::new).map_err(|e| {
        YtvmError::ExtractionError(format!(
            "Failed to open archive {}: {}",
            archive_path.display(),
            e
        ))
    })
}

fn extract_tar_gz(archive_path: &Path, target_dir: &Path, cancel: &CancelFlag) -> Result<()> {
    let tar_err = |e: io::Error| {
        error!("Failed to unpack {}: {}", archive_path.display(), e);
        YtvmError::ExtractionError(format!(
            "Failed to unpack GZipped TAR {}: {}",
            archive_path.display(),
            e
        ))
    };

    let decoder = GzDecoder::new(open_archive(archive_path)?);
    let mut archive = Archive::new(decoder);
    archive.set_overwrite(true);
    archive.set_preserve_permissions(true);

    for entry in archive.entries().map_err(tar_err)? {
        check_cancelled(cancel, archive_path)?;
        let mut entry = entry.map_err(tar_err)?;
        // `unpack_in` refuses entries that would land outside `target_dir`.
        if !entry.unpack_in(target_dir).map_err(tar_err)? {
            debug!(
                "Skipped TAR entry outside extraction dir: {}",
                entry.path().map(|p| p.display().to_string()).unwrap_or_default()
            );
        }
    }
    debug!("Finished TAR extraction for {}", archive_path.display());
    Ok(())
}

fn extract_zip(archive_path: &Path, target_dir: &Path, cancel: &CancelFlag) -> Result<()> {
    let zip_err = |what: &str, e: &dyn std::fmt::Display| {
        YtvmError::ExtractionError(format!("{} in {}: {}", what, archive_path.display(), e))
    };

    let mut archive =
        ZipArchive::new(open_archive(archive_path)?).map_err(|e| zip_err("Failed to open ZIP", &e))?;

    for i in 0..archive.len() {
        check_cancelled(cancel, archive_path)?;
        let mut entry = archive
            .by_index(i)
            .map_err(|e| zip_err("Failed to access ZIP entry", &e))?;
        let relative: PathBuf = entry.enclosed_name().ok_or_else(|| {
            error!(
                "Unsafe path '{}' in ZIP {}",
                entry.name(),
                archive_path.display()
            );
            YtvmError::ExtractionError(format!(
                "Unsafe path component in ZIP entry '{}'",
                entry.name()
            ))
        })?;
        let outpath = target_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| zip_err("Failed to create ZIP dir", &e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| zip_err("Failed to create ZIP parent dir", &e))?;
        }
        let mut outfile =
            File::create(&outpath).map_err(|e| zip_err("Failed to create ZIP file", &e))?;
        io::copy(&mut entry, &mut outfile).map_err(|e| zip_err("Failed to write ZIP file", &e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))
                    .map_err(|e| zip_err("Failed to set ZIP entry permissions", &e))?;
            }
        }
        debug!("Extracted ZIP entry to: {}", outpath.display());
    }

    debug!("Finished ZIP extraction for {}", archive_path.display());
    Ok(())
}
