use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Run-wide cancellation flag.
///
/// Clones share the same flag. The first call to [`trigger`](Self::trigger)
/// records the reason; later calls keep the flag set but do not overwrite it.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

#[derive(Debug, Default)]
struct AbortInner {
    triggered: AtomicBool,
    reason: OnceLock<String>,
}

impl AbortSignal {
    /// Create a signal that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal.
    pub fn trigger(&self, reason: impl Into<String>) {
        let _ = self.inner.reason.set(reason.into());
        self.inner.triggered.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once any clone has fired the signal.
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// The reason given to the first `trigger` call.
    pub fn reason(&self) -> Option<&str> {
        self.inner.reason.get().map(String::as_str)
    }
}
