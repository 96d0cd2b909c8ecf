//! Hub counters using atomics for lock-free access
//!
//! Incremented by the receiver and display threads, read by the status loop
//! in the binary and by tests.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct HubStats {
    /// Well-formed image messages from the simulator
    pub frames_received: AtomicU64,
    /// Image messages dropped for not matching the two-part contract
    pub frames_malformed: AtomicU64,
    /// Frames handed to the analyzer publisher
    pub frames_forwarded: AtomicU64,
    /// Frames the analyzer publisher refused or failed to send
    pub frame_forward_drops: AtomicU64,
    /// Decoded commands from the analyzer (including unknown types)
    pub commands_received: AtomicU64,
    /// Command messages that failed to decode or had an unknown type
    pub commands_invalid: AtomicU64,
    /// Commands handed to the simulator publisher
    pub commands_forwarded: AtomicU64,
    /// Commands the simulator publisher refused or failed to send
    pub command_forward_drops: AtomicU64,
    /// Callback invocations that panicked
    pub callback_failures: AtomicU64,
    /// Frames rejected by a full display queue
    pub display_drops: AtomicU64,
    /// Transport errors seen by the receiver loops
    pub transport_errors: AtomicU64,
}

/// Point-in-time copy of [`HubStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_received: u64,
    pub frames_malformed: u64,
    pub frames_forwarded: u64,
    pub frame_forward_drops: u64,
    pub commands_received: u64,
    pub commands_invalid: u64,
    pub commands_forwarded: u64,
    pub command_forward_drops: u64,
    pub callback_failures: u64,
    pub display_drops: u64,
    pub transport_errors: u64,
}

impl HubStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to `counter`
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n` to `counter`
    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            frames_received: load(&self.frames_received),
            frames_malformed: load(&self.frames_malformed),
            frames_forwarded: load(&self.frames_forwarded),
            frame_forward_drops: load(&self.frame_forward_drops),
            commands_received: load(&self.commands_received),
            commands_invalid: load(&self.commands_invalid),
            commands_forwarded: load(&self.commands_forwarded),
            command_forward_drops: load(&self.command_forward_drops),
            callback_failures: load(&self.callback_failures),
            display_drops: load(&self.display_drops),
            transport_errors: load(&self.transport_errors),
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frames rx={} fwd={} drop={} bad={} | commands rx={} fwd={} drop={} bad={} | callback_failures={} display_drops={} transport_errors={}",
            self.frames_received,
            self.frames_forwarded,
            self.frame_forward_drops,
            self.frames_malformed,
            self.commands_received,
            self.commands_forwarded,
            self.command_forward_drops,
            self.commands_invalid,
            self.callback_failures,
            self.display_drops,
            self.transport_errors,
        )
    }
}
