//! Latest-frame cache keyed by source id.
//!
//! Written only by the image receiver thread, read by any caller wanting a
//! status snapshot. Each insert replaces the previous frame of that source;
//! no history is kept.

use crate::core::types::Frame;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Thread-safe map from source id to its most recent frame
#[derive(Debug, Default)]
pub struct FrameCache {
    frames: Mutex<HashMap<String, Frame>>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached frame for `frame.source_id`
    pub fn insert(&self, frame: Frame) {
        self.frames.lock().insert(frame.source_id.clone(), frame);
    }

    /// Latest frame of one source
    ///
    /// Payloads are reference counted, so the clone does not copy image data.
    pub fn get(&self, source_id: &str) -> Option<Frame> {
        self.frames.lock().get(source_id).cloned()
    }

    /// Copy of every cached frame
    pub fn snapshot(&self) -> HashMap<String, Frame> {
        self.frames.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}
