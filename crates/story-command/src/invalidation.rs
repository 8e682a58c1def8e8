use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-session "navigation is not trustworthy" flag.
///
/// Set when a navigation attempt fails, cleared right before the next attempt.
/// Clones share the flag so every command bound to the same session sees it.
#[derive(Clone, Debug, Default)]
pub struct SessionInvalidation {
    flag: Arc<AtomicBool>,
}

impl SessionInvalidation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn mark(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
