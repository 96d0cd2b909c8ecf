//! Shared hub state.
//!
//! Each piece is owned by the hub behind an `Arc` and written by exactly one
//! receiver thread:
//! - Image receiver: frame cache, source registry, frame counters
//! - Command receiver: command counters
//! - Any thread: callback registration, reads for status queries

mod callbacks;
mod frame_cache;
mod source_registry;
mod stats;

pub use callbacks::{CallbackRegistry, CommandCallback, FrameCallback};
pub use frame_cache::FrameCache;
pub use source_registry::SourceRegistry;
pub use stats::{HubStats, StatsSnapshot};

/// State shared between the hub handle and its receiver threads
#[derive(Default)]
pub struct SharedState {
    pub frames: FrameCache,
    pub sources: SourceRegistry,
    pub callbacks: CallbackRegistry,
    pub stats: std::sync::Arc<HubStats>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }
}
