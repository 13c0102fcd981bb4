//! Failed-login throttle
//!
//! Tracks failed login attempts per account name and locks further attempts
//! out once a threshold is crossed within the window. Entries clear on a
//! successful login or once the window lapses.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct AttemptEntry {
    count: u32,
    window_start: Instant,
}

/// Not a global: one instance lives in the server state and is passed to the
/// service explicitly.
pub struct LoginThrottle {
    entries: Mutex<HashMap<String, AttemptEntry>>,
    threshold: u32,
    window: Duration,
}

impl LoginThrottle {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            threshold,
            window,
        }
    }

    /// Record one failed attempt for `key`. Returns the count inside the
    /// current window.
    pub fn record_failure(&self, key: &str) -> u32 {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.to_string()).or_insert(AttemptEntry {
            count: 0,
            window_start: now,
        });
        if now.duration_since(entry.window_start) > self.window {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count += 1;
        tracing::debug!("[throttle] fail key={} count={}", key, entry.count);
        entry.count
    }

    /// Returns true while `key` has reached the threshold inside the window.
    pub fn is_locked(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if now.duration_since(entry.window_start) > self.window => {
                entries.remove(key);
                false
            }
            Some(entry) => entry.count >= self.threshold,
            None => false,
        }
    }

    /// Clear the record for `key` (successful login).
    pub fn clear(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
    }
}
