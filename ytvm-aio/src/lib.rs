// ytvm-aio/src/lib.rs
//! Filesystem, archive and process operations used while provisioning and
//! running the delegated binary.

pub mod cancel;
pub mod extract;
pub mod fs;
pub mod process;

pub use cancel::CancelFlag;
pub use extract::extract_archive;
pub use fs::{create_staging_dir, find_file, install_executable};
pub use process::{run_delegate, ChildExit};
