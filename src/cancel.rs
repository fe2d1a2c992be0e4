//! Cooperative cancellation shared between a caller and a long run

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag checked by merge and batch runs at item boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
