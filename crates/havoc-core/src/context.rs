use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide run state shared between the scheduler loop and the signal
/// handler.
///
/// The handler performs a single atomic store; the loop reads the flag once
/// per iteration. Nothing here blocks, so the type is safe to touch from a
/// signal context.
#[derive(Debug, Default)]
pub struct RunContext {
    cancel: AtomicBool,
}

impl RunContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Request a safe exit. The in-flight enable/disable cycle finishes
    /// before the loop observes the flag.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}
