//! Cancellation context propagated to every executor call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::executor::ExecError;

/// A cancellation flag plus an optional deadline.
///
/// Clones share the flag, so cancelling any clone cancels them all. The
/// preload engine checks the context before every fetch and hands it to the
/// executor, which is expected to honour it as well.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ExecError> {
        if self.is_cancelled() {
            return Some(ExecError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ExecError::DeadlineExceeded),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_live() {
        let cx = Context::background();
        assert!(!cx.is_cancelled());
        assert!(cx.err().is_none());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let cx = Context::background();
        let child = cx.clone();
        child.cancel();
        assert!(cx.is_cancelled());
        assert!(matches!(cx.err(), Some(ExecError::Cancelled)));
    }

    #[test]
    fn test_expired_deadline() {
        let cx = Context::background().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(cx.err(), Some(ExecError::DeadlineExceeded)));
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let soon = Instant::now() + Duration::from_secs(1);
        let later = soon + Duration::from_secs(60);
        let cx = Context::background().with_deadline(soon).with_deadline(later);
        assert_eq!(cx.deadline(), Some(soon));
    }
}
