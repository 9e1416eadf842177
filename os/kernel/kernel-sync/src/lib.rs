//! # Kernel synchronization primitives
//!
//! A raw spin lock, a mutex generic over the raw lock, and an interrupt guard.
//! The page allocator keeps all of its bookkeeping behind one
//! [`SpinMutex`] taken through [`Mutex::lock_irq`], so a timer interrupt on
//! the same hart can never re-enter a half-updated free list.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod mutex;
mod raw_spin;

pub use irq::{IrqGuard, IrqMutex};
pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;

pub type SpinMutex<T> = Mutex<T, RawSpin>;

/// A lock without a payload.
///
/// # Safety
/// Implementations must provide mutual exclusion: between a successful
/// `lock`/`try_lock` and the matching `unlock`, no other caller may succeed.
/// Acquiring must synchronize-with the previous release.
pub unsafe trait RawMutex {
    /// An unlocked instance.
    const INIT: Self;

    fn lock(&self);

    /// Acquire without waiting; `false` if the lock is held.
    fn try_lock(&self) -> bool;

    /// # Safety
    /// The caller must hold the lock.
    unsafe fn unlock(&self);
}
