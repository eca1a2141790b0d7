// ytvm-core/src/lib.rs
pub mod install;

pub use install::{InstallOutcome, InstallState, Installer};
