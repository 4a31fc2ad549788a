use crate::session::traits::SessionStore;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct PendingImage {
    bytes: Vec<u8>,
    created_at: Instant,
}

/// Memory-resident store; nothing survives a restart, which is acceptable
/// for a validity window measured in minutes. Expired entries are purged
/// lazily on the next access for their owner.
pub struct MemorySessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<i64, PendingImage>>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, owner: i64, bytes: Vec<u8>) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            owner,
            PendingImage {
                bytes,
                created_at: Instant::now(),
            },
        );
    }

    fn take_if_fresh(&self, owner: i64) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.remove(&owner) {
            Some(pending) if pending.created_at.elapsed() <= self.ttl => Some(pending.bytes),
            _ => None,
        }
    }

    fn has_fresh(&self, owner: i64) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&owner) {
            Some(pending) if pending.created_at.elapsed() <= self.ttl => true,
            Some(_) => {
                entries.remove(&owner);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn take_returns_stored_bytes_exactly_once() {
        let store = MemorySessionStore::new(Duration::from_secs(600));
        store.put(1, vec![1, 2, 3]);

        assert_eq!(store.take_if_fresh(1), Some(vec![1, 2, 3]));
        assert_eq!(store.take_if_fresh(1), None);
    }

    #[test]
    fn put_overwrites_previous_entry() {
        let store = MemorySessionStore::new(Duration::from_secs(600));
        store.put(1, vec![1]);
        store.put(1, vec![2]);

        assert_eq!(store.take_if_fresh(1), Some(vec![2]));
    }

    #[test]
    fn owners_are_independent() {
        let store = MemorySessionStore::new(Duration::from_secs(600));
        store.put(1, vec![1]);
        store.put(2, vec![2]);

        assert_eq!(store.take_if_fresh(2), Some(vec![2]));
        assert_eq!(store.take_if_fresh(1), Some(vec![1]));
    }

    #[test]
    fn stale_entry_is_not_returned() {
        let store = MemorySessionStore::new(Duration::from_millis(20));
        store.put(1, vec![1, 2, 3]);
        thread::sleep(Duration::from_millis(40));

        assert_eq!(store.take_if_fresh(1), None);
    }

    #[test]
    fn has_fresh_does_not_consume() {
        let store = MemorySessionStore::new(Duration::from_secs(600));
        store.put(1, vec![9]);

        assert!(store.has_fresh(1));
        assert!(store.has_fresh(1));
        assert_eq!(store.take_if_fresh(1), Some(vec![9]));
        assert!(!store.has_fresh(1));
    }

    #[test]
    fn has_fresh_purges_stale_entries() {
        let store = MemorySessionStore::new(Duration::from_millis(20));
        store.put(1, vec![1]);
        thread::sleep(Duration::from_millis(40));

        assert!(!store.has_fresh(1));
        assert!(store.entries.lock().unwrap().is_empty());
    }
}
