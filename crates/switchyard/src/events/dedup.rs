//! Time-windowed suppression of repeated event occurrences.
//!
//! Each key remembers when it was last seen. A sighting within `window` of the
//! previous one is a duplicate; every sighting refreshes the timestamp. Memory
//! is bounded by sweeping expired keys on each call and by an LRU capacity.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

/// Opaque identifier of an event occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    /// Builds a key from any displayable value.
    pub fn new(value: impl fmt::Display) -> Self {
        Self(value.to_string())
    }

    /// Prefixes the key with an event name so equal ids of different events
    /// never collide.
    #[must_use]
    pub fn scoped(&self, event: &str) -> Self {
        Self(format!("{event}/{}", self.0))
    }

    /// The key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DedupKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for DedupKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for DedupKey {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<i64> for DedupKey {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Suppresses keys seen within a trailing window.
pub struct DedupGate {
    window: Duration,
    seen: Mutex<LruCache<DedupKey, Instant>>,
}

impl DedupGate {
    /// Creates a gate remembering at most `capacity` keys for `window`.
    #[must_use]
    pub fn new(window: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            window,
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Records `key` now and reports whether it is a duplicate.
    pub fn should_suppress(&self, key: &DedupKey) -> bool {
        self.should_suppress_at(key, Instant::now())
    }

    /// Records `key` at `now` and reports whether it is a duplicate.
    pub fn should_suppress_at(&self, key: &DedupKey, now: Instant) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        self.sweep(&mut seen, now);

        let duplicate = seen
            .peek(key)
            .is_some_and(|last| now.saturating_duration_since(*last) < self.window);
        seen.put(key.clone(), now);
        duplicate
    }

    /// Number of keys currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` when no key is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The suppression window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    // The least recently used entry is also the least recently seen one, so
    // expired keys are always at the tail.
    fn sweep(&self, seen: &mut LruCache<DedupKey, Instant>, now: Instant) {
        while let Some((_, last)) = seen.peek_lru() {
            if now.saturating_duration_since(*last) < self.window {
                break;
            }
            seen.pop_lru();
        }
    }
}

impl fmt::Debug for DedupGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupGate")
            .field("window", &self.window)
            .field("len", &self.len())
            .finish()
    }
}
