use crate::{Mutex, MutexGuard, RawMutex};
use core::ops::{Deref, DerefMut};

/// A mutex guard that also disables interrupts while held.
///
/// When created via [`Mutex::lock_irq`], it:
///
/// 1. saves the current interrupt state and disables interrupts, and
/// 2. acquires the underlying mutex,
///
/// releasing them in reverse order on drop.
///
/// This prevents an interrupt handler on the same hart from preempting the
/// critical section and spinning forever on a lock its own hart holds.
///
/// # Platform
///
/// On `riscv64` this toggles `sstatus.SIE`. On every other target (host
/// tests) the interrupt state is simulated, see [`interrupts_enabled`].
///
/// # Examples
///
/// ```
/// use kernel_sync::SpinMutex;
///
/// static M: SpinMutex<u64> = SpinMutex::new(0);
///
/// {
///     let mut g = M.lock_irq();
///     *g += 1;
/// }
/// assert_eq!(*M.lock(), 1);
/// ```
pub struct IrqMutex<'a, T, R: RawMutex> {
    // Field order is drop order: unlock first, then restore interrupts.
    g: MutexGuard<'a, T, R>,
    _irq: IrqGuard,
}

impl<T, R: RawMutex> Mutex<T, R> {
    /// Acquires the mutex with interrupts disabled for the guard's lifetime.
    ///
    /// Dropping the guard releases the mutex and then restores interrupts
    /// if they were previously enabled.
    #[inline]
    pub fn lock_irq(&self) -> IrqMutex<'_, T, R> {
        let irq = IrqGuard::new();
        let g = self.lock();
        IrqMutex { g, _irq: irq }
    }
}

impl<T, R: RawMutex> Deref for IrqMutex<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.g
    }
}

impl<T, R: RawMutex> DerefMut for IrqMutex<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.g
    }
}

#[cfg(target_arch = "riscv64")]
mod arch {
    /// `sstatus.SIE`: supervisor interrupt enable.
    const SSTATUS_SIE: usize = 1 << 1;

    #[inline]
    pub fn interrupts_enabled() -> bool {
        let r: usize;
        unsafe { core::arch::asm!("csrr {}, sstatus", out(reg) r, options(nomem, nostack)) }
        r & SSTATUS_SIE != 0
    }

    #[inline]
    pub fn disable_interrupts() {
        unsafe { core::arch::asm!("csrc sstatus, {}", in(reg) SSTATUS_SIE, options(nomem, nostack)) }
    }

    #[inline]
    pub fn enable_interrupts() {
        unsafe { core::arch::asm!("csrs sstatus, {}", in(reg) SSTATUS_SIE, options(nomem, nostack)) }
    }
}

#[cfg(not(target_arch = "riscv64"))]
mod arch {
    use core::sync::atomic::{AtomicBool, Ordering};

    /// Simulated interrupt-enable flag for hosted builds.
    static ENABLED: AtomicBool = AtomicBool::new(false);

    #[inline]
    pub fn interrupts_enabled() -> bool {
        ENABLED.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn disable_interrupts() {
        ENABLED.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn enable_interrupts() {
        ENABLED.store(true, Ordering::SeqCst);
    }
}

pub use arch::{disable_interrupts, enable_interrupts, interrupts_enabled};

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// Nested guards compose: an inner guard sees interrupts already disabled
/// and therefore leaves them disabled when it drops.
pub struct IrqGuard {
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = interrupts_enabled();
        if enabled {
            disable_interrupts();
        }
        Self {
            were_enabled: enabled,
        }
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            enable_interrupts();
        }
    }
}
