// ytvm-aio/src/cancel.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop request for work running on the blocking pool. Dropping the
/// future that awaits a `spawn_blocking` task does not stop the task, so
/// long-running loops poll this flag between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
