//! Outbound forwarders
//!
//! Both forwarders publish without blocking and never report failure to
//! their caller: a would-block or transport error is logged, counted and the
//! message is gone. There is no acknowledgement and no retry.

use crate::core::types::Command;
use crate::state::HubStats;
use crate::transport::{Delivery, Publisher};
use parking_lot::Mutex;
use std::sync::Arc;

/// Re-publishes frames on the analyzer image channel
///
/// Owned by the image receiver thread.
pub struct FrameForwarder {
    publisher: Box<dyn Publisher>,
    stats: Arc<HubStats>,
}

impl FrameForwarder {
    pub fn new(publisher: Box<dyn Publisher>, stats: Arc<HubStats>) -> Self {
        Self { publisher, stats }
    }

    /// Publish `[source_id, payload]`; returns whether it was sent
    pub fn forward(&mut self, source_id: &str, payload: &[u8]) -> bool {
        match self.publisher.send(&[source_id.as_bytes(), payload]) {
            Ok(Delivery::Sent) => {
                HubStats::bump(&self.stats.frames_forwarded);
                log::trace!("Forwarded {} bytes from {} to analyzer", payload.len(), source_id);
                true
            }
            Ok(Delivery::WouldBlock) => {
                HubStats::bump(&self.stats.frame_forward_drops);
                log::warn!("Analyzer image queue full, dropped frame from {}", source_id);
                false
            }
            Err(e) => {
                HubStats::bump(&self.stats.frame_forward_drops);
                log::error!("Failed to forward frame from {}: {}", source_id, e);
                false
            }
        }
    }
}

/// Publishes commands on the simulator control channel
///
/// Cloned between the command receiver thread and the hub's `send_command`,
/// so the publisher sits behind a mutex. [`CommandForwarder::close`] releases
/// the socket; later forwards are dropped with a warning.
#[derive(Clone)]
pub struct CommandForwarder {
    publisher: Arc<Mutex<Option<Box<dyn Publisher>>>>,
    stats: Arc<HubStats>,
}

impl CommandForwarder {
    pub fn new(publisher: Box<dyn Publisher>, stats: Arc<HubStats>) -> Self {
        Self {
            publisher: Arc::new(Mutex::new(Some(publisher))),
            stats,
        }
    }

    /// Serialize `command` as one JSON frame and publish it
    pub fn forward(&self, command: &Command) -> bool {
        match command.to_json() {
            Ok(json) => self.forward_raw(command, json.as_bytes()),
            Err(e) => {
                HubStats::bump(&self.stats.command_forward_drops);
                log::error!("Failed to encode {} command: {}", command.kind(), e);
                false
            }
        }
    }

    /// Publish `body`, the already validated JSON of `command`, unchanged
    pub fn forward_raw(&self, command: &Command, body: &[u8]) -> bool {
        let mut guard = self.publisher.lock();
        let Some(publisher) = guard.as_mut() else {
            HubStats::bump(&self.stats.command_forward_drops);
            log::warn!("Simulator control socket closed, dropped {}", command.kind());
            return false;
        };

        match publisher.send(&[body]) {
            Ok(Delivery::Sent) => {
                HubStats::bump(&self.stats.commands_forwarded);
                log::debug!(
                    "Sent {} to simulator (target '{}', id {:?})",
                    command.kind(),
                    command.target_id(),
                    command.message_id()
                );
                true
            }
            Ok(Delivery::WouldBlock) => {
                HubStats::bump(&self.stats.command_forward_drops);
                log::warn!("Simulator control queue full, dropped {}", command.kind());
                false
            }
            Err(e) => {
                HubStats::bump(&self.stats.command_forward_drops);
                log::error!("Failed to send {} to simulator: {}", command.kind(), e);
                false
            }
        }
    }

    /// Release the publisher socket
    pub fn close(&self) {
        self.publisher.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.publisher.lock().is_none()
    }
}
