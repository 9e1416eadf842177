use crate::RawMutex;
use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// Mutual exclusion over `T`, parameterized by the raw lock `R`.
///
/// There is no poisoning: a panic inside a critical section releases the
/// lock during unwinding and the data stays as the panicking code left it.
pub struct Mutex<T, R> {
    raw: R,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send, R: RawMutex + Sync> Sync for Mutex<T, R> {}

impl<T, R: RawMutex> Mutex<T, R> {
    /// Usable in `static` initializers.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            raw: R::INIT,
            data: UnsafeCell::new(value),
        }
    }

    /// Spin until the lock is acquired.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, R> {
        self.raw.lock();
        MutexGuard::new(self)
    }

    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, R>> {
        self.raw.try_lock().then(|| MutexGuard::new(self))
    }

    /// Run `f` on the protected value.
    #[inline]
    pub fn with_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
        f(&mut self.lock())
    }

    /// [`with_lock`](Self::with_lock) with interrupts disabled for the duration.
    #[inline]
    pub fn with_lock_irq<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
        f(&mut self.lock_irq())
    }
}

impl<T, R> Mutex<T, R> {
    /// No locking needed: `&mut self` proves exclusivity.
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    #[inline]
    pub const fn raw(&self) -> &R {
        &self.raw
    }
}

impl<T: fmt::Debug, R: RawMutex> fmt::Debug for Mutex<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(g) => f.debug_struct("Mutex").field("data", &*g).finish(),
            None => f.write_str("Mutex { <locked> }"),
        }
    }
}

/// Proof of holding a [`Mutex`]; unlocks on drop.
///
/// Not `Send`: the lock must be released on the hart that took it, which
/// matters once the guard also owns the interrupt state.
pub struct MutexGuard<'a, T, R: RawMutex> {
    mutex: &'a Mutex<T, R>,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: Sync, R: RawMutex + Sync> Sync for MutexGuard<'_, T, R> {}

impl<'a, T, R: RawMutex> MutexGuard<'a, T, R> {
    const fn new(mutex: &'a Mutex<T, R>) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }
}

impl<T, R: RawMutex> Deref for MutexGuard<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T, R: RawMutex> DerefMut for MutexGuard<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock and is borrowed mutably.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T, R: RawMutex> Drop for MutexGuard<'_, T, R> {
    fn drop(&mut self) {
        unsafe { self.mutex.raw.unlock() }
    }
}
