//! Per-thread connection slots.
//!
//! Slots are keyed by an opaque [`ThreadToken`]. The registry lock only
//! covers lookups, inserts and removals; opening and closing connections
//! happens outside of it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, ReentrantMutex};

use crate::connection::{DbConnection, SharedConnection};

/// Opaque identity of an OS thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadToken(ThreadId);

impl ThreadToken {
    /// Token of the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self(thread::current().id())
    }
}

impl fmt::Display for ThreadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// A thread's connection together with the number of handles holding it.
///
/// A slot with no holders is kept while its connection is still borrowed,
/// so the thread keeps a single physical connection.
pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) connection: SharedConnection,
    holders: usize,
}

impl Slot {
    fn is_borrowed(&self) -> bool {
        Arc::strong_count(&self.connection) > 1
    }
}

/// Outcome of releasing one holder of a slot.
pub(crate) enum Release {
    /// The thread had no held slot.
    NotHeld,
    /// Other holders remain on the thread.
    StillHeld(usize),
    /// The last holder released while the connection is still borrowed; the
    /// slot stays until its last borrow drops.
    Borrowed,
    /// The last holder released; the slot was removed and must be closed.
    Removed(Slot),
}

#[derive(Default)]
pub(crate) struct SlotRegistry {
    slots: Mutex<HashMap<ThreadToken, Slot>>,
}

impl SlotRegistry {
    /// Add a holder to an existing slot, including one that is only kept
    /// alive by borrows. Returns `false` if there is none.
    pub(crate) fn acquire_existing(&self, token: ThreadToken) -> bool {
        match self.slots.lock().get_mut(&token) {
            Some(slot) => {
                slot.holders += 1;
                true
            }
            None => false,
        }
    }

    /// Store a freshly opened connection with a single holder.
    pub(crate) fn insert(&self, token: ThreadToken, connection: DbConnection) {
        let slot = Slot {
            name: connection.name().to_string(),
            connection: Arc::new(ReentrantMutex::new(connection)),
            holders: 1,
        };
        let previous = self.slots.lock().insert(token, slot);
        debug_assert!(previous.is_none(), "thread {token} already had a slot");
    }

    /// The connection of a held slot.
    pub(crate) fn get(&self, token: ThreadToken) -> Option<SharedConnection> {
        self.slots
            .lock()
            .get(&token)
            .filter(|slot| slot.holders > 0)
            .map(|slot| Arc::clone(&slot.connection))
    }

    /// Whether the thread has a held slot.
    pub(crate) fn contains(&self, token: ThreadToken) -> bool {
        self.slots
            .lock()
            .get(&token)
            .is_some_and(|slot| slot.holders > 0)
    }

    /// Release one holder of the thread's slot.
    pub(crate) fn release(&self, token: ThreadToken) -> Release {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&token).filter(|slot| slot.holders > 0) else {
            return Release::NotHeld;
        };
        slot.holders -= 1;
        if slot.holders > 0 {
            return Release::StillHeld(slot.holders);
        }
        if slot.is_borrowed() {
            return Release::Borrowed;
        }
        match slots.remove(&token) {
            Some(slot) => Release::Removed(slot),
            None => Release::NotHeld,
        }
    }

    /// Remove the thread's slot once it has neither holders nor borrows.
    pub(crate) fn remove_unused(&self, token: ThreadToken) -> Option<Slot> {
        let mut slots = self.slots.lock();
        match slots.get(&token) {
            Some(slot) if slot.holders == 0 && !slot.is_borrowed() => slots.remove(&token),
            _ => None,
        }
    }

    /// Remove the thread's slot regardless of its holders.
    pub(crate) fn remove(&self, token: ThreadToken) -> Option<Slot> {
        self.slots.lock().remove(&token)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionParams;

    fn open(name: &str) -> DbConnection {
        DbConnection::open(&ConnectionParams::in_memory(), name).unwrap()
    }

    #[test]
    fn test_holders_are_counted() {
        let registry = SlotRegistry::default();
        let token = ThreadToken::current();

        assert!(!registry.acquire_existing(token));
        registry.insert(token, open("t-1"));
        assert!(registry.acquire_existing(token));
        assert_eq!(registry.len(), 1);

        assert!(matches!(registry.release(token), Release::StillHeld(1)));
        match registry.release(token) {
            Release::Removed(slot) => assert_eq!(slot.name, "t-1"),
            _ => panic!("expected the slot to be removed"),
        }
        assert!(matches!(registry.release(token), Release::NotHeld));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_tokens_differ_between_threads() {
        let here = ThreadToken::current();
        let there = thread::spawn(ThreadToken::current).join().unwrap();
        assert_ne!(here, there);
        assert_eq!(here, ThreadToken::current());
    }

    #[test]
    fn test_get_returns_shared_connection() {
        let registry = SlotRegistry::default();
        let token = ThreadToken::current();
        assert!(registry.get(token).is_none());

        registry.insert(token, open("t-1"));
        let a = registry.get(token).unwrap();
        let b = registry.get(token).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.contains(token));
        assert!(registry.remove(token).is_some());
        assert!(!registry.contains(token));
    }

    #[test]
    fn test_borrowed_slot_outlives_its_holders() {
        let registry = SlotRegistry::default();
        let token = ThreadToken::current();
        registry.insert(token, open("t-1"));
        let borrow = registry.get(token).unwrap();

        assert!(matches!(registry.release(token), Release::Borrowed));
        assert!(!registry.contains(token));
        assert!(registry.get(token).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_unused(token).is_none());

        // Reacquiring picks up the same connection.
        assert!(registry.acquire_existing(token));
        assert!(Arc::ptr_eq(&borrow, &registry.get(token).unwrap()));
        assert!(matches!(registry.release(token), Release::Borrowed));

        drop(borrow);
        let slot = registry.remove_unused(token).unwrap();
        assert_eq!(slot.name, "t-1");
        assert_eq!(registry.len(), 0);
    }
}
