//! Rolling one-second frame rate per source.
//!
//! Timestamps older than one second are trimmed on every update and on every
//! query, so a source that goes quiet decays to 0 without needing new frames.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub struct FpsTracker {
    windows: HashMap<String, VecDeque<Instant>>,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source_id: &str) {
        self.record_at(source_id, Instant::now());
    }

    /// Record a frame of `source_id` seen at `now`
    pub fn record_at(&mut self, source_id: &str, now: Instant) {
        let window = self.windows.entry(source_id.to_string()).or_default();
        window.push_back(now);
        trim(window, now);
    }

    pub fn fps(&mut self, source_id: &str) -> f32 {
        self.fps_at(source_id, Instant::now())
    }

    /// Frames of `source_id` within the second ending at `now`
    pub fn fps_at(&mut self, source_id: &str, now: Instant) -> f32 {
        match self.windows.get_mut(source_id) {
            Some(window) => {
                trim(window, now);
                window.len() as f32
            }
            None => 0.0,
        }
    }
}

fn trim(window: &mut VecDeque<Instant>, now: Instant) {
    while let Some(&oldest) = window.front() {
        if now.saturating_duration_since(oldest) > WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}
