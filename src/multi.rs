//! Deadlock-free locking across a fixed set of mutexes.
//!
//! [`MultiLock`] acquires the locks of several [`Mutex`] containers as one
//! atomic unit and exposes their values as a tuple of references only while
//! every lock is held. Two guards locking overlapping sets in different
//! orders can never deadlock: the acquisition protocol never blocks while
//! holding a strict subset of its target set.
//!
//! The set of containers is a tuple of `&Mutex<T>` references (any mix of
//! value types, arity 1 through 8) or a single `&Mutex<T>` for the
//! one-container case. Sets are described by the sealed [`MutexSet`] trait,
//! so constructing a guard over anything that is not a mutex reference is a
//! compile error.
//!
//! # Examples
//!
//! ```
//! use multilock::{MultiLock, Mutex};
//!
//! let name = Mutex::new(String::from("data1"));
//! let count = Mutex::new(100);
//!
//! let mut guard = MultiLock::new((&name, &count));
//! assert!(guard.owns());
//!
//! let (n, c) = guard.data_mut().unwrap();
//! *n = String::from("new_data");
//! *c += 1;
//! drop(guard);
//!
//! assert_eq!(*name.lock(), "new_data");
//! assert_eq!(*count.lock(), 101);
//! ```
//!
//! Reversed acquisition orders are safe:
//!
//! ```
//! use multilock::{MultiLock, Mutex};
//! use std::thread;
//!
//! let a = Mutex::new(0);
//! let b = Mutex::new(0);
//!
//! thread::scope(|s| {
//!     s.spawn(|| {
//!         let mut guard = MultiLock::new((&a, &b));
//!         let (x, y) = guard.data_mut().unwrap();
//!         *x += 1;
//!         *y += 1;
//!     });
//!     s.spawn(|| {
//!         let mut guard = MultiLock::new((&b, &a));
//!         let (y, x) = guard.data_mut().unwrap();
//!         *x += 1;
//!         *y += 1;
//!     });
//! });
//!
//! assert_eq!(*a.lock(), 2);
//! assert_eq!(*b.lock(), 2);
//! ```

use std::fmt;

use static_assertions::assert_not_impl_any;
use tracing::trace;

use crate::mutex::{Mutex, MutexRef};

mod sealed {
    pub trait Sealed {}
}

/// A fixed-arity set of [`Mutex`] references that can be locked together.
///
/// Implemented for `&Mutex<T>` (the one-container case, where the data is a
/// plain reference rather than a 1-tuple) and for tuples
/// `(&Mutex<T1>, ..., &Mutex<Tn>)` up to arity 8. This trait is sealed;
/// the implementations above are the only lock sets there are.
pub trait MutexSet: sealed::Sealed {
    /// Per-container guard slots. Always all `Some` (every lock held) or all
    /// `None` (no lock held); the acquisition paths never leave a partial
    /// set behind.
    type Guards: Default;

    /// Shared references to the protected values, tied to a borrow of the
    /// guard slots.
    type DataRef<'g>
    where
        Self: 'g;

    /// Mutable references to the protected values, tied to a mutable borrow
    /// of the guard slots.
    type DataMut<'g>
    where
        Self: 'g;

    #[doc(hidden)]
    fn try_acquire(&self) -> Result<Self::Guards, usize>;

    #[doc(hidden)]
    fn block_on(&self, idx: usize);

    #[doc(hidden)]
    fn distinct(&self) -> bool;

    /// Returns whether every slot holds a lock.
    fn owns(guards: &Self::Guards) -> bool;

    /// Shared references to all protected values, or `None` unless every
    /// lock is held.
    fn data_ref<'g>(guards: &'g Self::Guards) -> Option<Self::DataRef<'g>>;

    /// Mutable references to all protected values, or `None` unless every
    /// lock is held.
    fn data_mut<'g>(guards: &'g mut Self::Guards) -> Option<Self::DataMut<'g>>;

    /// Acquires every lock in the set, blocking as needed, without ever
    /// blocking while holding a partial set.
    ///
    /// The protocol is try-and-back-off: attempt every lock without
    /// blocking; on the first contended lock, drop everything already taken,
    /// then block on the contended lock while holding nothing, release it,
    /// and retry from the start. Freedom from deadlock follows because a
    /// blocked thread holds no lock another thread could be waiting for.
    /// There is no fairness guarantee beyond the platform lock's.
    fn lock_all(&self) -> Self::Guards {
        loop {
            match self.try_acquire() {
                Ok(guards) => return guards,
                Err(contended) => {
                    trace!(contended, "lock set contended, parking on the blocker");
                    self.block_on(contended);
                }
            }
        }
    }

    /// Attempts to acquire every lock in the set without blocking.
    ///
    /// All-or-nothing: on the first contended lock, every lock already taken
    /// is released and `None` is returned. There is no report of which lock
    /// was contended.
    fn try_lock_all(&self) -> Option<Self::Guards> {
        self.try_acquire().ok()
    }
}

// One-container set. Same state machine as the tuple case, but the data is
// a plain reference and the blocking path is a single direct lock.
impl<'a, T: ?Sized> sealed::Sealed for &'a Mutex<T> {}

impl<'a, T: ?Sized> MutexSet for &'a Mutex<T> {
    type Guards = Option<MutexRef<'a, T>>;

    type DataRef<'g>
        = &'g T
    where
        Self: 'g;

    type DataMut<'g>
        = &'g mut T
    where
        Self: 'g;

    fn try_acquire(&self) -> Result<Self::Guards, usize> {
        match (*self).try_lock() {
            Some(guard) => Ok(Some(guard)),
            None => Err(0),
        }
    }

    fn block_on(&self, _idx: usize) {
        drop((*self).lock());
    }

    fn distinct(&self) -> bool {
        true
    }

    fn owns(guards: &Self::Guards) -> bool {
        guards.is_some()
    }

    fn data_ref<'g>(guards: &'g Self::Guards) -> Option<Self::DataRef<'g>> {
        guards.as_ref().map(|guard| &**guard)
    }

    fn data_mut<'g>(guards: &'g mut Self::Guards) -> Option<Self::DataMut<'g>> {
        guards.as_mut().map(|guard| &mut **guard)
    }

    fn lock_all(&self) -> Self::Guards {
        Some((*self).lock())
    }
}

macro_rules! mutex_set_tuple {
    ($(($($idx:tt $guard:ident $T:ident),+))+) => {$(
        impl<'a, $($T: ?Sized),+> sealed::Sealed for ($(&'a Mutex<$T>,)+) {}

        impl<'a, $($T: ?Sized),+> MutexSet for ($(&'a Mutex<$T>,)+) {
            type Guards = ($(Option<MutexRef<'a, $T>>,)+);

            type DataRef<'g>
                = ($(&'g $T,)+)
            where
                Self: 'g;

            type DataMut<'g>
                = ($(&'g mut $T,)+)
            where
                Self: 'g;

            fn try_acquire(&self) -> Result<Self::Guards, usize> {
                $(
                    let $guard = match self.$idx.try_lock() {
                        Some(guard) => guard,
                        // Early return drops every guard taken so far, so a
                        // failed attempt never leaves a partial set behind.
                        None => return Err($idx),
                    };
                )+
                Ok(($(Some($guard),)+))
            }

            fn block_on(&self, idx: usize) {
                match idx {
                    $($idx => drop(self.$idx.lock()),)+
                    _ => {}
                }
            }

            fn distinct(&self) -> bool {
                let addrs = [$(self.$idx as *const Mutex<$T> as *const (),)+];
                let mut distinct = true;
                for (i, addr) in addrs.iter().enumerate() {
                    distinct &= !addrs[..i].contains(addr);
                }
                distinct
            }

            fn owns(guards: &Self::Guards) -> bool {
                let mut owns = true;
                $(owns &= guards.$idx.is_some();)+
                owns
            }

            fn data_ref<'g>(guards: &'g Self::Guards) -> Option<Self::DataRef<'g>> {
                match ($(guards.$idx.as_ref(),)+) {
                    ($(Some($guard),)+) => Some(($(&**$guard,)+)),
                    _ => None,
                }
            }

            fn data_mut<'g>(guards: &'g mut Self::Guards) -> Option<Self::DataMut<'g>> {
                match ($(guards.$idx.as_mut(),)+) {
                    ($(Some($guard),)+) => Some(($(&mut **$guard,)+)),
                    _ => None,
                }
            }
        }
    )+};
}

mutex_set_tuple! {
    (0 g0 T0)
    (0 g0 T0, 1 g1 T1)
    (0 g0 T0, 1 g1 T1, 2 g2 T2)
    (0 g0 T0, 1 g1 T1, 2 g2 T2, 3 g3 T3)
    (0 g0 T0, 1 g1 T1, 2 g2 T2, 3 g3 T3, 4 g4 T4)
    (0 g0 T0, 1 g1 T1, 2 g2 T2, 3 g3 T3, 4 g4 T4, 5 g5 T5)
    (0 g0 T0, 1 g1 T1, 2 g2 T2, 3 g3 T3, 4 g4 T4, 5 g5 T5, 6 g6 T6)
    (0 g0 T0, 1 g1 T1, 2 g2 T2, 3 g3 T3, 4 g4 T4, 5 g5 T5, 6 g6 T6, 7 g7 T7)
}

/// RAII guard that atomically holds the locks of a fixed set of [`Mutex`]
/// containers.
///
/// A guard is either `Locked` (every constituent lock held) or `Unlocked`
/// (none held); [`owns`](MultiLock::owns) reports which. Data access through
/// [`data`](MultiLock::data) and [`data_mut`](MultiLock::data_mut) is only
/// possible while `Locked`. The guard borrows its containers; it never owns
/// them.
///
/// Mutability of access follows mutability of the handle: a shared borrow of
/// the guard yields only shared references to the protected values, even
/// though the locks underneath are exclusive. This is a capability
/// restriction on the handle, not on the lock.
///
/// Guards are move-only. Moving one transfers every lock to the destination;
/// the moved-from binding is statically unusable afterward, so it can never
/// release a lock behind the destination's back.
///
/// Lock sets are type-checked: anything that is not a set of [`Mutex`]
/// references is rejected at compile time.
///
/// ```compile_fail
/// use multilock::MultiLock;
///
/// let not_a_mutex = 5_i32;
/// let guard = MultiLock::new((&not_a_mutex,));
/// ```
#[must_use = "if unused all locks are released immediately"]
pub struct MultiLock<S: MutexSet> {
    set: S,
    guards: S::Guards,
}

impl<S: MutexSet> MultiLock<S> {
    /// Acquires every lock in `set`, blocking until all are held.
    ///
    /// Deadlock-free against any other guard over an overlapping set, in any
    /// order: the protocol never blocks while holding a partial set. The
    /// returned guard is `Locked`.
    ///
    /// The mutexes in the set must be distinct instances; passing the same
    /// container twice is a contract violation caught by `debug_assert!`.
    pub fn new(set: S) -> Self {
        debug_assert!(set.distinct(), "multi-lock over duplicate mutexes");
        let guards = set.lock_all();
        Self { set, guards }
    }

    /// Attempts to acquire every lock in `set` without blocking.
    ///
    /// All-or-nothing: if any lock is contended, everything already taken is
    /// released and the returned guard is `Unlocked` (re-lockable via
    /// [`lock`](MultiLock::lock) or [`try_lock`](MultiLock::try_lock)).
    /// There is no report of which lock was contended.
    ///
    /// ```
    /// use multilock::{MultiLock, Mutex};
    ///
    /// let a = Mutex::new(1);
    /// let b = Mutex::new(2);
    ///
    /// let held = a.lock();
    /// let guard = MultiLock::try_new((&a, &b));
    /// assert!(!guard.owns());
    /// assert!(guard.data().is_none());
    /// // The failed attempt did not leave b locked behind.
    /// assert!(!b.is_locked());
    /// # drop(held);
    /// ```
    pub fn try_new(set: S) -> Self {
        debug_assert!(set.distinct(), "multi-lock over duplicate mutexes");
        let guards = set.try_lock_all().unwrap_or_default();
        Self { set, guards }
    }

    /// Returns whether this guard currently holds every lock in its set.
    #[must_use]
    pub fn owns(&self) -> bool {
        S::owns(&self.guards)
    }

    /// Re-acquires every lock on a guard that is not currently `Locked`,
    /// blocking until all are held. No-op if already `Locked`.
    pub fn lock(&mut self) {
        if !self.owns() {
            self.guards = self.set.lock_all();
        }
    }

    /// Attempts to re-acquire every lock without blocking, all-or-nothing.
    ///
    /// Returns whether the guard is `Locked` afterward; `true` immediately
    /// if it already was.
    pub fn try_lock(&mut self) -> bool {
        if !self.owns() {
            if let Some(guards) = self.set.try_lock_all() {
                self.guards = guards;
            }
        }
        self.owns()
    }

    /// Releases every held lock together, leaving the guard `Unlocked` and
    /// re-lockable. No-op if already `Unlocked`.
    pub fn unlock(&mut self) {
        self.guards = Default::default();
    }

    /// Shared references to all protected values, or `None` unless this
    /// guard is `Locked`.
    ///
    /// Available through a shared borrow, so an immutable handle can read
    /// but never write.
    #[must_use]
    pub fn data(&self) -> Option<S::DataRef<'_>> {
        S::data_ref(&self.guards)
    }

    /// Mutable references to all protected values, or `None` unless this
    /// guard is `Locked`.
    ///
    /// The references borrow the guard mutably, so they cannot outlive lock
    /// ownership and the guard cannot be unlocked or moved while they live.
    #[must_use]
    pub fn data_mut(&mut self) -> Option<S::DataMut<'_>> {
        S::data_mut(&mut self.guards)
    }
}

impl<S: MutexSet> fmt::Debug for MultiLock<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiLock")
            .field("owns", &self.owns())
            .finish_non_exhaustive()
    }
}

// Guards hold platform locks that must be released on the acquiring thread.
assert_not_impl_any!(MultiLock<&'static Mutex<i32>>: Clone, Send);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_lock_owns_and_data() {
        let a = Mutex::new(String::from("data1"));
        let b = Mutex::new(100);

        {
            let mut guard = MultiLock::new((&a, &b));
            assert!(guard.owns());

            let (s, n) = guard.data_mut().expect("guard owns both locks");
            *s = String::from("new_data");
            *n += 1;
        }

        assert_eq!(*a.lock(), "new_data");
        assert_eq!(*b.lock(), 101);
    }

    #[test]
    fn test_multi_lock_shared_access_is_read_only() {
        let a = Mutex::new(1);
        let b = Mutex::new(2);

        let guard = MultiLock::new((&a, &b));
        let (x, y) = guard.data().expect("guard owns both locks");
        assert_eq!((*x, *y), (1, 2));
    }

    #[test]
    fn test_try_new_rolls_back_on_contention() {
        let a = Mutex::new(1);
        let b = Mutex::new(2);

        let held = b.lock();
        let guard = MultiLock::try_new((&a, &b));
        assert!(!guard.owns());
        assert!(guard.data().is_none());
        // The partial acquisition of `a` was rolled back.
        assert!(!a.is_locked());
        drop(held);
    }

    #[test]
    fn test_relock_after_failed_try() {
        let a = Mutex::new(1);
        let b = Mutex::new(2);

        let held = a.lock();
        let mut guard = MultiLock::try_new((&a, &b));
        assert!(!guard.owns());
        assert!(!guard.try_lock());

        drop(held);
        assert!(guard.try_lock());
        assert!(guard.owns());
        assert_eq!(guard.data().map(|(x, y)| (*x, *y)), Some((1, 2)));
    }

    #[test]
    fn test_unlock_releases_all_and_relocks() {
        let a = Mutex::new(1);
        let b = Mutex::new(2);

        let mut guard = MultiLock::new((&a, &b));
        guard.unlock();
        assert!(!guard.owns());
        assert!(!a.is_locked());
        assert!(!b.is_locked());

        guard.lock();
        assert!(guard.owns());
        assert!(a.is_locked());
        assert!(b.is_locked());
    }

    #[test]
    fn test_single_mutex_specialization() {
        let m = Mutex::new(41);

        let mut guard = MultiLock::new(&m);
        assert!(guard.owns());
        *guard.data_mut().expect("lock held") += 1;
        drop(guard);

        assert_eq!(*m.lock(), 42);
    }

    #[test]
    fn test_move_transfers_all_locks() {
        let a = Mutex::new(1);
        let b = Mutex::new(2);

        let guard = MultiLock::new((&a, &b));
        let moved = guard;
        assert!(moved.owns());
        assert!(a.try_lock().is_none());
        assert!(b.try_lock().is_none());

        drop(moved);
        assert!(a.try_lock().is_some());
        assert!(b.try_lock().is_some());
    }

    #[test]
    fn test_higher_arity_sets() {
        let a = Mutex::new(1u8);
        let b = Mutex::new(2u16);
        let c = Mutex::new(3u32);
        let d = Mutex::new(4u64);

        let mut guard = MultiLock::new((&a, &b, &c, &d));
        let (w, x, y, z) = guard.data_mut().expect("all four locks held");
        *w += 1;
        *x += 1;
        *y += 1;
        *z += 1;
        drop(guard);

        assert_eq!(*a.lock(), 2);
        assert_eq!(*b.lock(), 3);
        assert_eq!(*c.lock(), 4);
        assert_eq!(*d.lock(), 5);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "duplicate mutexes")]
    fn test_duplicate_mutexes_rejected() {
        let m = Mutex::new(0);
        let _guard = MultiLock::try_new((&m, &m));
    }
}
