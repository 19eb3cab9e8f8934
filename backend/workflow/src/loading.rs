use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// "A model call is in flight" flag.
///
/// Clones share the same flag, so an observer can watch it while the
/// controller is busy awaiting the provider.
#[derive(Debug, Clone, Default)]
pub struct LoadingFlag(Arc<AtomicBool>);

impl LoadingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Raise the flag. Returns `None` if it is already raised.
    pub fn try_acquire(&self) -> Option<LoadingGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoadingGuard(Arc::clone(&self.0)))
    }
}

/// Lowers the flag when dropped, whatever path the call took.
#[derive(Debug)]
pub struct LoadingGuard(Arc<AtomicBool>);

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
