//! [`Mailbox`] – single-slot, last-write-wins exchange cell.
//!
//! A mailbox holds at most one value. Writers replace it, the consumer takes
//! it (leaving the slot empty), and observers may peek at a clone. The lock is
//! held only for the swap itself, so neither side ever waits on I/O.
//!
//! The coalescer keeps its pending command in a mailbox and the camera
//! pipeline keeps its latest frame in one.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Single-slot cell with atomic replace, take and peek.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Mailbox<T> {
    /// Create an empty mailbox.
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Store `value`, returning whatever it displaced.
    pub fn put(&self, value: T) -> Option<T> {
        self.lock().replace(value)
    }

    /// Remove and return the current value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Mutate the slot in place under the lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut Option<T>) -> R) -> R {
        let mut slot = self.lock();
        f(&mut *slot)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        // A panicking writer cannot leave the Option half-written.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Mailbox<T> {
    /// Return a clone of the current value without removing it.
    pub fn peek(&self) -> Option<T> {
        self.lock().clone()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
