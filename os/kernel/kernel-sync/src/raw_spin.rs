use crate::RawMutex;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// Test-and-test-and-set spin lock without a payload.
///
/// Waiters spin on a relaxed load and only retry the compare-exchange once
/// the flag reads clear, so a contended lock does not bounce its cache line
/// between harts on every iteration.
pub struct RawSpin {
    locked: AtomicBool,
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Whether some context currently holds the lock. Racy; diagnostics only.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for RawSpin {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl RawMutex for RawSpin {
    const INIT: Self = Self::new();

    #[inline]
    fn lock(&self) {
        loop {
            if self.try_lock() {
                return;
            }
            while self.is_locked() {
                spin_loop();
            }
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    unsafe fn unlock(&self) {
        debug_assert!(self.is_locked(), "unlocking a free spin lock");
        self.locked.store(false, Ordering::Release);
    }
}
