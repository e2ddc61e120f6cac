//! Locking and execution-context primitives
//!
//! [`Protection`] is the interface-wide lock. Acquisition is always scoped:
//! the guard releases the lock when it goes out of scope, on every return
//! path, so there is no separate release call to forget.

pub mod context;

use core::hint::spin_loop;

pub use context::{ContextGuard, ExecutionContext};

pub type ProtectionGuard<'a, T> = spin::MutexGuard<'a, T>;

/// Mutual exclusion over the mutable state of one IP instance.
pub struct Protection<T> {
    inner: spin::Mutex<T>,
}

impl<T> Protection<T> {
    pub const fn new(value: T) -> Self {
        Protection {
            inner: spin::Mutex::new(value),
        }
    }

    /// Acquire the lock, waiting for as long as it takes.
    pub fn lock(&self) -> ProtectionGuard<'_, T> {
        self.inner.lock()
    }

    /// Bounded-wait variant of [`lock`](Self::lock): give up after `spins`
    /// failed attempts.
    pub fn try_lock_for(&self, spins: usize) -> Option<ProtectionGuard<'_, T>> {
        for _ in 0..spins {
            if let Some(guard) = self.inner.try_lock() {
                return Some(guard);
            }
            spin_loop();
        }
        None
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
