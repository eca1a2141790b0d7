// ytvm-common/src/platform.rs
//! Host platform detection and the release naming it maps to.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, YtvmError};

/// Container format a release asset is published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// File extension used in release asset names (without the leading dot).
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = YtvmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            "zip" => Ok(ArchiveFormat::Zip),
            other => Err(YtvmError::UnsupportedArchive(other.to_string())),
        }
    }
}

/// Release naming for one supported (OS, architecture) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub os_name: &'static str,
    pub arch_name: &'static str,
    pub archive_format: ArchiveFormat,
    pub executable_suffix: &'static str,
}

impl TargetDescriptor {
    /// Resolves the descriptor for the running host.
    pub fn current() -> Result<Self> {
        Self::resolve(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Maps Rust's `std::env::consts` OS/arch names onto release naming.
    pub fn resolve(os: &str, arch: &str) -> Result<Self> {
        let unix = |os_name: &'static str, arch_name: &'static str| TargetDescriptor {
            os_name,
            arch_name,
            archive_format: ArchiveFormat::TarGz,
            executable_suffix: "",
        };
        let descriptor = match (os, arch) {
            ("macos", "x86_64") => unix("darwin", "amd64"),
            ("macos", "aarch64") => unix("darwin", "arm64"),
            ("linux", "x86_64") => unix("linux", "amd64"),
            ("linux", "aarch64") => unix("linux", "arm64"),
            ("windows", "x86_64") => TargetDescriptor {
                os_name: "windows",
                arch_name: "amd64",
                archive_format: ArchiveFormat::Zip,
                executable_suffix: ".exe",
            },
            _ => {
                return Err(YtvmError::UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
        };
        tracing::debug!("Resolved {}/{} to {:?}", os, arch, descriptor);
        Ok(descriptor)
    }

    /// `{os}-{arch}` key used for the install subdirectory.
    pub fn platform_key(&self) -> String {
        format!("{}-{}", self.os_name, self.arch_name)
    }
}
