//! Observer lists for frames and commands
//!
//! Callbacks run synchronously on the receiver thread that saw the event, in
//! registration order. They must not block: a slow callback stalls the
//! receive loop and, with it, forwarding for that bus.
//!
//! A callback that panics is logged and counted; the remaining callbacks for
//! the same event still run, as do callbacks for later events. The list is
//! copied before iteration so a callback may register further callbacks
//! without deadlocking.

use crate::core::types::Command;
use bytes::Bytes;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Frame observer: `(source_id, payload)`
pub type FrameCallback = Arc<dyn Fn(&str, &Bytes) + Send + Sync>;

/// Command observer
pub type CommandCallback = Arc<dyn Fn(&Command) + Send + Sync>;

#[derive(Default)]
pub struct CallbackRegistry {
    frame: Mutex<Vec<FrameCallback>>,
    command: Mutex<Vec<CommandCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_frame<F>(&self, callback: F)
    where
        F: Fn(&str, &Bytes) + Send + Sync + 'static,
    {
        self.frame.lock().push(Arc::new(callback));
    }

    pub fn register_command<F>(&self, callback: F)
    where
        F: Fn(&Command) + Send + Sync + 'static,
    {
        self.command.lock().push(Arc::new(callback));
    }

    pub fn frame_count(&self) -> usize {
        self.frame.lock().len()
    }

    pub fn command_count(&self) -> usize {
        self.command.lock().len()
    }

    /// Invoke every frame callback; returns how many panicked
    pub fn dispatch_frame(&self, source_id: &str, payload: &Bytes) -> u64 {
        let callbacks = self.frame.lock().clone();
        let mut failures = 0;
        for (index, callback) in callbacks.iter().enumerate() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(source_id, payload))) {
                failures += 1;
                log::error!(
                    "Frame callback #{} failed for source {}: {}",
                    index,
                    source_id,
                    panic_message(&panic)
                );
            }
        }
        failures
    }

    /// Invoke every command callback; returns how many panicked
    pub fn dispatch_command(&self, command: &Command) -> u64 {
        let callbacks = self.command.lock().clone();
        let mut failures = 0;
        for (index, callback) in callbacks.iter().enumerate() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(command))) {
                failures += 1;
                log::error!(
                    "Command callback #{} failed for {} (target '{}'): {}",
                    index,
                    command.kind(),
                    command.target_id(),
                    panic_message(&panic)
                );
            }
        }
        failures
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
