//! The vendor's live mirror directory.
//!
//! Mirrors keep a bare liveness marker, not a relationship: each
//! `MIRRORADVERTISE` simply overwrites whatever entry an IP had before, and
//! entries older than `expiry` are lazily dropped the next time someone asks
//! for the list.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uppir_wire::vendor::MirrorDescriptor;

struct Entry {
    descriptor: MirrorDescriptor,
    advertised_at: Instant,
}

pub struct MirrorDirectory {
    entries: Mutex<HashMap<String, Entry>>,
    expiry: Duration,
}

impl MirrorDirectory {
    pub fn new(expiry: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    /// Records (or replaces) the advertisement from `descriptor.ip`.
    pub fn upsert(&self, descriptor: MirrorDescriptor) {
        let mut entries = self.entries.lock().expect("mirror directory mutex poisoned");
        entries.insert(
            descriptor.ip.clone(),
            Entry {
                descriptor,
                advertised_at: Instant::now(),
            },
        );
    }

    /// Purges expired entries and returns the remaining mirrors as JSON
    /// values, in the shape `GET MIRRORLIST` serves on the wire.
    pub fn live_list(&self) -> Vec<serde_json::Value> {
        let mut entries = self.entries.lock().expect("mirror directory mutex poisoned");
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.advertised_at) <= self.expiry);
        entries
            .values()
            .map(|entry| serde_json::to_value(&entry.descriptor).expect("MirrorDescriptor always serializes"))
            .collect()
    }
}
