//! # Multilock
//!
//! Scoped, deadlock-free mutual exclusion over one or more protected values.
//!
//! This library provides two composable abstractions built on the
//! battle-tested `parking_lot` primitive:
//!
//! - [`Mutex<T>`] wraps one value together with its own exclusive lock.
//!   Locking it (blocking [`Mutex::lock`] or non-blocking
//!   [`Mutex::try_lock`]) yields a [`MutexRef`] guard that grants read/write
//!   access for its lifetime and releases the lock automatically.
//! - [`MultiLock`] atomically acquires the locks of a fixed set of
//!   containers, in any order, without the possibility of deadlock against
//!   other guards locking the same containers in a different order. The
//!   protected values are exposed as a tuple of references only while every
//!   lock is held.
//!
//! ## Core Problem Solved
//!
//! Nesting single-container locks by hand deadlocks as soon as two threads
//! acquire the same pair in opposite orders. `MultiLock` replaces nesting
//! with a single all-or-nothing acquisition that never blocks while holding
//! a partial set, so overlapping guards cannot wait on each other forever.
//!
//! ## Key Features
//!
//! - **Scoped access**: protected data is reachable only through a live
//!   guard; lock release is tied to guard lifetime, never to convention
//! - **Deadlock-free multi-locking**: all-or-nothing acquisition over any
//!   mix of value types, arity 1 through 8
//! - **Move-only ownership**: locks transfer on move and can never be
//!   duplicated; use-after-release is a compile error, not a runtime fault
//! - **Absent-result contention**: try variants report contention as `None`
//!   or an `Unlocked` guard, never as an error code
//!
//! ## Quick Start
//!
//! ```
//! use multilock::{MultiLock, Mutex};
//!
//! let name = Mutex::new(String::from("data1"));
//! let count = Mutex::new(100);
//!
//! // Single-container access.
//! *count.lock() += 1;
//!
//! // Atomic access to both, deadlock-free against any other order.
//! let mut guard = MultiLock::new((&name, &count));
//! let (n, c) = guard.data_mut().unwrap();
//! *n = String::from("new_data");
//! *c += 1;
//! drop(guard);
//!
//! assert_eq!(*name.lock(), "new_data");
//! assert_eq!(*count.lock(), 102);
//! ```
//!
//! Blocking acquisitions cannot be cancelled or timed out; callers needing a
//! deadline build it from the try variants. Every acquisition is exclusive;
//! there is no reader/writer distinction.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Mutex-protected value container and its scoped lock guard.
pub mod mutex;
/// Deadlock-free locking across a fixed set of mutexes.
pub mod multi;

pub use multi::{MultiLock, MutexSet};
pub use mutex::{Mutex, MutexRef};
