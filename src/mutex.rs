//! Mutex-protected value container and its scoped lock guard.
//!
//! [`Mutex`] bundles one owned value with its own exclusive lock, built on
//! the battle-tested `parking_lot` primitive. The only way to reach the value
//! is through a [`MutexRef`] guard obtained from [`Mutex::lock`] (blocking)
//! or [`Mutex::try_lock`] (non-blocking). The guard releases the lock when it
//! is dropped, explicitly released, or moved out of scope.
//!
//! # Features
//!
//! - No poisoning on panic
//! - Compact memory footprint
//! - Fast lock/unlock operations
//! - Contention reported as an absent result, never an error code
//!
//! # Examples
//!
//! Basic usage:
//!
//! ```
//! use multilock::Mutex;
//!
//! let mutex = Mutex::new(0);
//! *mutex.lock() = 10;
//! assert_eq!(*mutex.lock(), 10);
//! ```
//!
//! Concurrent access:
//!
//! ```
//! use multilock::Mutex;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let mutex = Arc::new(Mutex::new(0));
//! let mut handles = vec![];
//!
//! for _ in 0..10 {
//!     let mutex = Arc::clone(&mutex);
//!     handles.push(thread::spawn(move || {
//!         let mut num = mutex.lock();
//!         *num += 1;
//!     }));
//! }
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(*mutex.lock(), 10);
//! ```

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr;

use static_assertions::{assert_impl_all, assert_not_impl_any};

/// A value bundled with its own exclusive lock.
///
/// The container exclusively owns its value; it cannot be cloned (cloning
/// would duplicate a lock, which is unsound), only moved. Moving a `Mutex`
/// by value is always race-free: ownership proves that no [`MutexRef`] into
/// it is outstanding, so no lock needs to be taken during the transfer.
///
/// Assigning a new value into a *shared* container goes through
/// [`Mutex::replace`] (one lock) or [`Mutex::swap`] (both locks, taken in a
/// consistent order).
pub struct Mutex<T: ?Sized> {
    inner: parking_lot::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Creates a new container wrapping `value`. No lock is held afterward.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            inner: parking_lot::Mutex::new(value),
        }
    }

    /// Consumes the container and returns the wrapped value.
    ///
    /// Takes `self` by value, so no lock is needed: ownership proves that no
    /// guard is outstanding.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Locks the container, swaps in `value`, and returns the old value.
    ///
    /// This is the single-container form of assigning into a shared `Mutex`.
    pub fn replace(&self, value: T) -> T {
        mem::replace(&mut *self.lock(), value)
    }

    /// Swaps the values of two containers, holding both locks for the
    /// duration of the exchange.
    ///
    /// The two locks are acquired in a consistent (address) order, so two
    /// threads concurrently swapping the same pair cannot deadlock. Swapping
    /// a container with itself is a no-op.
    pub fn swap(&self, other: &Self) {
        if ptr::eq(self, other) {
            return;
        }
        // Address order keeps concurrent swaps over the same pair deadlock-free.
        let (first, second) = if (self as *const Self) < (other as *const Self) {
            (self, other)
        } else {
            (other, self)
        };
        let mut a = first.inner.lock();
        let mut b = second.inner.lock();
        mem::swap(&mut *a, &mut *b);
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires the lock, blocking the current thread until it is available,
    /// and returns a guard scoped to this container.
    ///
    /// This call cannot fail; `parking_lot` locks do not poison, so a panic
    /// in another thread while holding the lock simply releases it on unwind.
    /// Locking a container twice from the same thread deadlocks, which is
    /// exactly what [`MultiLock`](crate::MultiLock) exists to avoid for
    /// multi-container critical sections.
    pub fn lock(&self) -> MutexRef<'_, T> {
        MutexRef {
            inner: self.inner.lock(),
        }
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Returns `None` immediately if the lock is held by anyone else
    /// (including the current thread). Contention is not an error; callers
    /// retry on their own terms.
    ///
    /// ```
    /// use multilock::Mutex;
    ///
    /// let mutex = Mutex::new(5);
    /// let guard = mutex.lock();
    /// assert!(mutex.try_lock().is_none());
    /// drop(guard);
    /// assert_eq!(*mutex.try_lock().unwrap(), 5);
    /// ```
    pub fn try_lock(&self) -> Option<MutexRef<'_, T>> {
        self.inner.try_lock().map(|guard| MutexRef { inner: guard })
    }

    /// Returns whether the lock is currently held by anyone.
    ///
    /// The answer is immediately stale; use it for diagnostics, not for
    /// lock-free fast paths.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Returns a mutable reference to the wrapped value.
    ///
    /// The `&mut self` borrow proves no guard is outstanding, so no lock is
    /// taken.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Mutex<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug + ?Sized> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("Mutex").field("data", &&*guard).finish(),
            None => f.debug_struct("Mutex").field("data", &"<locked>").finish(),
        }
    }
}

/// RAII guard granting read/write access to the value inside one [`Mutex`]
/// for as long as it holds that container's lock.
///
/// The lock is released when the guard is dropped or explicitly consumed by
/// [`MutexRef::release`]. A guard is move-only: moving it transfers lock
/// ownership, and the moved-from binding can no longer be used or dropped;
/// the compiler, not a runtime flag, rules out double release.
///
/// Access goes through `Deref`/`DerefMut`, so indexing and coercion to plain
/// references come for free and cost nothing beyond the lock already paid
/// for at construction:
///
/// ```
/// use multilock::Mutex;
///
/// fn total(values: &[i32]) -> i32 {
///     values.iter().sum()
/// }
///
/// let items = Mutex::new(vec![1, 2, 3]);
/// {
///     let guard = items.lock();
///     assert_eq!(guard[1], 2);
/// }
/// assert_eq!(total(&items.lock()), 6);
/// ```
#[must_use = "if unused the lock is released immediately"]
pub struct MutexRef<'a, T: ?Sized> {
    inner: parking_lot::MutexGuard<'a, T>,
}

impl<T: ?Sized> MutexRef<'_, T> {
    /// Releases the lock before the end of the guard's scope.
    ///
    /// Consumes the guard, so the type system prevents any further access to
    /// the now-unsynchronized value through it. This is an associated
    /// function so it can never shadow a method of the wrapped value; call it
    /// as `MutexRef::release(guard)`.
    pub fn release(this: Self) {
        drop(this);
    }
}

impl<T: ?Sized> Deref for MutexRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized> DerefMut for MutexRef<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: fmt::Debug + ?Sized> fmt::Debug for MutexRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display + ?Sized> fmt::Display for MutexRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

// Lock ownership must not be duplicated, and the platform lock must be
// released on the thread that acquired it.
assert_impl_all!(Mutex<i32>: Send, Sync);
assert_not_impl_any!(Mutex<i32>: Clone);
assert_not_impl_any!(MutexRef<'static, i32>: Clone, Send);
