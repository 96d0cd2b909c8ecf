//! Source ids discovered at runtime.
//!
//! Membership only grows while a hub instance is alive.

use parking_lot::Mutex;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct SourceRegistry {
    ids: Mutex<BTreeSet<String>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `source_id`; returns true the first time it is seen
    pub fn insert(&self, source_id: &str) -> bool {
        let mut ids = self.ids.lock();
        if ids.contains(source_id) {
            return false;
        }
        ids.insert(source_id.to_string())
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.ids.lock().contains(source_id)
    }

    /// Known ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        self.ids.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}
