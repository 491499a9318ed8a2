//! Re-entrancy lock for anything that shows or hides the primary window.
//!
//! OS hotkey layers deliver key-repeat presses as separate events, and the
//! tray or settings window can ask for a show while a hide is still settling.
//! The guard lets exactly one operation through, then keeps the door shut for
//! a fixed cooldown measured from the moment that operation finished.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cooldown after a guarded operation completes.
pub const TOGGLE_COOLDOWN: Duration = Duration::from_millis(300);

pub struct ToggleGuard {
    in_flight: AtomicBool,
}

impl Default for ToggleGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ToggleGuard {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run `op` unless another guarded operation is still in flight or cooling down.
    ///
    /// Failures of `op` are logged and swallowed. Returns whether `op` ran,
    /// which callers only use for logging.
    pub async fn guarded_run<F, Fut, E>(&self, label: &str, op: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("[toggle] {label} dropped: another window operation is in flight");
            return false;
        }

        // cleared on every exit, including cancellation of this future
        let _release = InFlight {
            flag: &self.in_flight,
        };

        if let Err(e) = op().await {
            log::warn!("[toggle] {label} failed: {e}");
        }

        tokio::time::sleep(TOGGLE_COOLDOWN).await;
        true
    }
}

struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
