// ytvm-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::debug;

use super::error::{Result, YtvmError};
use crate::artifact::VersionTag;

pub const BASE_NAME: &str = "yt-vod-manager";
pub const DEFAULT_RELEASE_BASE_URL: &str =
    "https://github.com/marcohefti/yt-vod-manager/releases/download";
pub const MAX_REDIRECTS: usize = 10;

const INSTALL_ROOT_VAR: &str = "YTVM_INSTALL_ROOT";
const RELEASE_BASE_URL_VAR: &str = "YTVM_RELEASE_BASE_URL";
const VERSION_VAR: &str = "YTVM_VERSION";
const STAGING_DIR_VAR: &str = "YTVM_STAGING_DIR";
const ALLOW_INSECURE_VAR: &str = "YTVM_ALLOW_INSECURE";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_name: String,
    pub version: VersionTag,
    pub release_base_url: String,
    pub install_root: PathBuf,
    pub staging_root: PathBuf,
    pub max_redirects: usize,
    pub allow_insecure: bool,
}

impl Config {
    /// Loads the launcher configuration from the environment.
    ///
    /// `package_version` is the version the launcher itself was packaged
    /// with; `YTVM_VERSION` overrides it.
    pub fn load(package_version: &str) -> Result<Self> {
        debug!("Loading launcher configuration");

        let version = env_non_empty(VERSION_VAR)
            .map(|v| {
                debug!("{} override in effect: {}", VERSION_VAR, v);
                VersionTag::from_version(&v)
            })
            .unwrap_or_else(|| VersionTag::from_version(package_version));

        let release_base_url = env_non_empty(RELEASE_BASE_URL_VAR)
            .unwrap_or_else(|| DEFAULT_RELEASE_BASE_URL.to_string());

        let install_root = match env_non_empty(INSTALL_ROOT_VAR) {
            Some(root) => PathBuf::from(root),
            None => default_install_root()?,
        };
        debug!("Effective install root: {}", install_root.display());

        let staging_root = env_non_empty(STAGING_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        let allow_insecure = env::var(ALLOW_INSECURE_VAR).is_ok_and(|v| v == "1");

        debug!("Configuration loaded successfully.");
        Ok(Self {
            base_name: BASE_NAME.to_string(),
            version,
            release_base_url,
            install_root,
            staging_root,
            max_redirects: MAX_REDIRECTS,
            allow_insecure,
        })
    }

    /// Configuration with defaults rooted at `install_root`; used by tests and
    /// embedders that do not read the environment.
    pub fn with_install_root(install_root: &Path, version: &str) -> Self {
        Self {
            base_name: BASE_NAME.to_string(),
            version: VersionTag::from_version(version),
            release_base_url: DEFAULT_RELEASE_BASE_URL.to_string(),
            install_root: install_root.to_path_buf(),
            staging_root: env::temp_dir(),
            max_redirects: MAX_REDIRECTS,
            allow_insecure: false,
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Prefix for staging directory names.
    pub fn staging_prefix(&self) -> String {
        format!("{}-launcher-", self.base_name)
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// `<dir of the launcher executable>/../vendor`, falling back to the per-user
/// data directory when the executable path cannot be determined.
fn default_install_root() -> Result<PathBuf> {
    match env::current_exe() {
        Ok(exe) => {
            let exe = exe.canonicalize().unwrap_or(exe);
            if let Some(root) = exe.parent().and_then(Path::parent) {
                return Ok(root.join("vendor"));
            }
            debug!(
                "Launcher executable {} has no grandparent directory",
                exe.display()
            );
        }
        Err(e) => debug!("Could not determine launcher executable path: {}", e),
    }

    ProjectDirs::from("", "", BASE_NAME)
        .map(|dirs| dirs.data_local_dir().join("vendor"))
        .ok_or_else(|| {
            YtvmError::Config(format!(
                "Could not determine an install root; set {INSTALL_ROOT_VAR}"
            ))
        })
}
