// ytvm-common/src/artifact.rs
//! Derives release asset names, download URLs and local install paths.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::platform::TargetDescriptor;

/// Release tag (`v` + semantic version). Treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag(String);

impl VersionTag {
    /// Builds a tag from a package version, adding the `v` marker when absent.
    pub fn from_version(version: &str) -> Self {
        let version = version.trim();
        if version.starts_with('v') {
            Self(version.to_string())
        } else {
            Self(format!("v{version}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub local_binary_name: String,
    pub remote_asset_file_name: String,
    pub remote_url: String,
}

impl ArtifactNames {
    pub fn derive(
        base_name: &str,
        release_base_url: &str,
        target: &TargetDescriptor,
        version: &VersionTag,
    ) -> Self {
        let local_binary_name = format!("{}{}", base_name, target.executable_suffix);
        let remote_asset_file_name = format!(
            "{}_{}_{}_{}.{}",
            base_name,
            version,
            target.os_name,
            target.arch_name,
            target.archive_format.extension()
        );
        let remote_url = format!(
            "{}/{}/{}",
            release_base_url.trim_end_matches('/'),
            version,
            remote_asset_file_name
        );
        Self {
            local_binary_name,
            remote_asset_file_name,
            remote_url,
        }
    }
}

/// Durable location of the installed executable for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationPaths {
    pub install_dir: PathBuf,
    pub binary_path: PathBuf,
}

impl InstallationPaths {
    pub fn new(install_root: &Path, target: &TargetDescriptor, names: &ArtifactNames) -> Self {
        let install_dir = install_root.join(target.platform_key());
        let binary_path = install_dir.join(&names.local_binary_name);
        Self {
            install_dir,
            binary_path,
        }
    }
}
