//! Cooperative timeout and abort signalling.
//!
//! Long-running operations (runner and solver loops) poll a pair of shared
//! atomic flags between iterations; the in-flight iteration always completes
//! before the loop exits. A [`TimeoutGuard`] arms a watcher thread that sets
//! the timeout flag on every registered handle once the deadline passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A clonable handle to a timeout/abort flag pair. Clones share the flags.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    timeout_expired: Arc<AtomicBool>,
    aborted: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Interrupt::default()
    }

    /// Requests interruption; the observed loop exits at its next safe
    /// point with its state consistent.
    pub fn interrupt(&self) {
        self.timeout_expired.store(true, Ordering::Relaxed);
    }

    /// Requests unrecoverable termination.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    pub fn timeout_expired(&self) -> bool {
        self.timeout_expired.load(Ordering::Relaxed)
    }

    pub fn aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// True when either flag is raised.
    pub fn stop_requested(&self) -> bool {
        self.timeout_expired() || self.aborted()
    }

    /// Clears both flags.
    pub fn reset(&self) {
        self.timeout_expired.store(false, Ordering::Relaxed);
        self.aborted.store(false, Ordering::Relaxed);
    }
}

/// Watcher armed for a deadline. While the guard is alive a background
/// thread waits for the timeout; on expiry it raises the timeout flag on
/// every handle it was given. Dropping the guard before the deadline wakes
/// the watcher through channel disconnection, so a finished run never leaks
/// a pending interruption into the next one.
#[derive(Debug)]
pub struct TimeoutGuard {
    cancel: Option<Sender<()>>,
    watcher: Option<thread::JoinHandle<()>>,
}

impl TimeoutGuard {
    pub fn arm(timeout: Duration, handles: Vec<Interrupt>) -> Self {
        let (cancel, alarm) = mpsc::channel::<()>();
        let watcher = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = alarm.recv_timeout(timeout) {
                for handle in &handles {
                    handle.interrupt();
                }
            }
        });
        TimeoutGuard {
            cancel: Some(cancel),
            watcher: Some(watcher),
        }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        drop(self.cancel.take());
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_start_clear() {
        let interrupt = Interrupt::new();
        assert!(!interrupt.timeout_expired());
        assert!(!interrupt.aborted());
        assert!(!interrupt.stop_requested());
    }

    #[test]
    fn test_clones_share_flags() {
        let interrupt = Interrupt::new();
        let clone = interrupt.clone();
        clone.interrupt();
        assert!(interrupt.timeout_expired());
        interrupt.reset();
        assert!(!clone.timeout_expired());
    }

    #[test]
    fn test_abort_is_separate_flag() {
        let interrupt = Interrupt::new();
        interrupt.abort();
        assert!(interrupt.aborted());
        assert!(!interrupt.timeout_expired());
        assert!(interrupt.stop_requested());
    }

    #[test]
    fn test_guard_fires_after_deadline() {
        let a = Interrupt::new();
        let b = Interrupt::new();
        let guard = TimeoutGuard::arm(Duration::from_millis(10), vec![a.clone(), b.clone()]);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !a.timeout_expired() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(a.timeout_expired());
        assert!(b.timeout_expired());
        drop(guard);
    }

    #[test]
    fn test_guard_dropped_early_leaves_flags_clear() {
        let interrupt = Interrupt::new();
        let guard = TimeoutGuard::arm(Duration::from_secs(60), vec![interrupt.clone()]);
        drop(guard);
        assert!(!interrupt.timeout_expired());
    }
}
