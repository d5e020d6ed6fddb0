use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caller-supplied warning sink. Must be safe to call from any task. The
/// core only emits warnings and errors through it; anything finer-grained
/// goes through `tracing`.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;

/// A logger that forwards to `tracing::warn!`. Used when the caller does not
/// inject one.
pub fn tracing_logger() -> Logger {
    Arc::new(|msg: &str| tracing::warn!("{msg}"))
}

/// Cooperative cancellation handle, checked at message boundaries. Cloning
/// shares the underlying flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
