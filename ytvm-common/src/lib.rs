// ytvm-common/src/lib.rs
pub mod artifact;
pub mod config;
pub mod error;
pub mod platform;

// Re-export key types
pub use artifact::{ArtifactNames, InstallationPaths, VersionTag};
pub use config::Config;
pub use error::{Result, YtvmError};
pub use platform::{ArchiveFormat, TargetDescriptor};
