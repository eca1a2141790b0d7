// ytvm-core/src/install/mod.rs
//! Ensures the platform binary is present at its canonical path.
//!
//! The installer is a small state machine:
//! `Cached` if the binary already exists, otherwise `Staging` (download,
//! extract, locate) ending in `Installed` or `Failed`. The staging directory
//! is removed on both terminal paths and when a termination signal aborts
//! the install.

pub mod signal;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use reqwest::Client;
use tracing::{debug, error};
use ytvm_aio::fs::{create_staging_dir, find_file, install_executable, remove_staging_dir};
use ytvm_aio::{extract_archive, CancelFlag};
use ytvm_common::artifact::{ArtifactNames, InstallationPaths};
use ytvm_common::config::Config;
use ytvm_common::error::{Result, YtvmError};
use ytvm_common::platform::TargetDescriptor;
use ytvm_net::{build_http_client, fetch_to_file};

const EXTRACT_DIR_NAME: &str = "extracted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Cached,
    Staging,
    Installed,
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallState::Cached => "CACHED",
            InstallState::Staging => "STAGING",
            InstallState::Installed => "INSTALLED",
            InstallState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Successful terminal state of an install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Cached(PathBuf),
    Installed(PathBuf),
}

impl InstallOutcome {
    pub fn binary_path(&self) -> &Path {
        match self {
            InstallOutcome::Cached(path) | InstallOutcome::Installed(path) => path,
        }
    }

    pub fn state(&self) -> InstallState {
        match self {
            InstallOutcome::Cached(_) => InstallState::Cached,
            InstallOutcome::Installed(_) => InstallState::Installed,
        }
    }
}

pub struct Installer<'a> {
    config: &'a Config,
    target: TargetDescriptor,
    names: ArtifactNames,
    paths: InstallationPaths,
    client: Client,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a Config, target: TargetDescriptor) -> Result<Self> {
        let names = ArtifactNames::derive(
            &config.base_name,
            &config.release_base_url,
            &target,
            &config.version,
        );
        let paths = InstallationPaths::new(config.install_root(), &target, &names);
        debug!(
            "Artifact {} -> {}",
            names.remote_url,
            paths.binary_path.display()
        );
        Ok(Self {
            config,
            target,
            names,
            paths,
            client: build_http_client()?,
        })
    }

    pub fn names(&self) -> &ArtifactNames {
        &self.names
    }

    pub fn paths(&self) -> &InstallationPaths {
        &self.paths
    }

    /// Whether the canonical binary is already present.
    pub fn is_installed(&self) -> bool {
        self.paths.binary_path.exists()
    }

    /// Installs the binary unless it is already cached. Aborts with
    /// `YtvmError::Interrupted` on SIGINT/SIGTERM.
    pub async fn ensure_installed(&self) -> Result<InstallOutcome> {
        self.ensure_installed_until(signal::shutdown_signal()).await
    }

    /// Like `ensure_installed`, but aborts when `interrupt` resolves; the
    /// future yields the name of the interrupting event.
    pub async fn ensure_installed_until<F>(&self, interrupt: F) -> Result<InstallOutcome>
    where
        F: Future<Output = String>,
    {
        let binary_path = &self.paths.binary_path;
        if binary_path.exists() {
            debug!("[{}] {}", InstallState::Cached, binary_path.display());
            return Ok(InstallOutcome::Cached(binary_path.clone()));
        }

        std::fs::create_dir_all(&self.paths.install_dir).map_err(|e| {
            YtvmError::InstallError(format!(
                "Failed to create install directory {}: {}",
                self.paths.install_dir.display(),
                e
            ))
        })?;
        let staging = create_staging_dir(
            self.config.staging_root(),
            &self.config.staging_prefix(),
        )?;
        debug!("[{}] {}", InstallState::Staging, staging.path().display());

        let interrupt = std::pin::pin!(interrupt);
        let result = self.stage_and_install(staging.path(), interrupt).await;

        remove_staging_dir(staging);

        match result {
            Ok(()) => {
                debug!("[{}] {}", InstallState::Installed, binary_path.display());
                Ok(InstallOutcome::Installed(binary_path.clone()))
            }
            Err(e) => {
                debug!("[{}] {}", InstallState::Failed, e);
                Err(e)
            }
        }
    }

    async fn stage_and_install<F>(&self, staging: &Path, mut interrupt: Pin<&mut F>) -> Result<()>
    where
        F: Future<Output = String>,
    {
        let archive_path = staging.join(&self.names.remote_asset_file_name);
        let download =
            fetch_to_file(&self.client, &self.names.remote_url, &archive_path, self.config);
        // The download is plain async I/O and stops as soon as it is dropped.
        tokio::select! {
            result = download => {
                result?;
            }
            source = interrupt.as_mut() => return Err(interrupted(source)),
        }

        let extract_dir = staging.join(EXTRACT_DIR_NAME);
        let cancel = CancelFlag::new();
        let extraction =
            extract_archive(&archive_path, self.target.archive_format, &extract_dir, &cancel);
        settle(extraction, &cancel, interrupt.as_mut()).await?;

        let binary_name = self.names.local_binary_name.clone();
        let asset = self.names.remote_asset_file_name.clone();
        let dest = self.paths.binary_path.clone();
        let placement = async move {
            tokio::task::spawn_blocking(move || {
                let located = find_file(&extract_dir, &binary_name).ok_or_else(|| {
                    error!("{} not found in extracted {}", binary_name, asset);
                    YtvmError::BinaryNotFound {
                        name: binary_name.clone(),
                        asset: asset.clone(),
                    }
                })?;
                install_executable(&located, &dest)
            })
            .await
            .map_err(|e| YtvmError::InstallError(format!("JoinError during install: {e}")))?
        };
        settle(placement, &cancel, interrupt).await
    }
}

fn interrupted(source: String) -> YtvmError {
    error!("Install interrupted by {}", source);
    YtvmError::Interrupted(source)
}

/// Races blocking-pool `work` against `interrupt`. On interrupt, `cancel` is
/// set and `work` is awaited until it stops, so nothing writes into staging
/// once this returns.
async fn settle<W, F>(work: W, cancel: &CancelFlag, interrupt: Pin<&mut F>) -> Result<()>
where
    W: Future<Output = Result<()>>,
    F: Future<Output = String>,
{
    let mut work = std::pin::pin!(work);
    tokio::select! {
        result = work.as_mut() => result,
        source = interrupt => {
            cancel.cancel();
            if let Err(e) = work.await {
                debug!("Staged work stopped after interrupt: {}", e);
            }
            Err(interrupted(source))
        }
    }
}
