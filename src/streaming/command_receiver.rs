//! Inbound command receiver
//!
//! Reads single-frame JSON commands published by the analyzer, forwards each
//! decoded command to the simulator and then runs command callbacks. The
//! forwarded frame is the analyzer's original JSON, byte for byte.
//! Undecodable messages and unknown command types are logged and dropped.

use super::forwarder::CommandForwarder;
use crate::config::RuntimeConfig;
use crate::core::types::Command;
use crate::error::{Error, Result};
use crate::state::{HubStats, SharedState};
use crate::transport::{Multipart, Received, Subscriber};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct CommandReceiver {
    subscriber: Box<dyn Subscriber>,
    forwarder: CommandForwarder,
    state: Arc<SharedState>,
    running: Arc<AtomicBool>,
    poll_timeout: Duration,
    error_backoff: Duration,
}

impl CommandReceiver {
    pub fn new(
        subscriber: Box<dyn Subscriber>,
        forwarder: CommandForwarder,
        state: Arc<SharedState>,
        running: Arc<AtomicBool>,
        runtime: &RuntimeConfig,
    ) -> Self {
        Self {
            subscriber,
            forwarder,
            state,
            running,
            poll_timeout: runtime.poll_timeout(),
            error_backoff: runtime.error_backoff(),
        }
    }

    /// Receive until the running flag is cleared
    pub fn run(mut self) {
        log::info!("Command receiver started");

        while self.running.load(Ordering::Relaxed) {
            match self.subscriber.recv(self.poll_timeout) {
                Ok(Received::Message(parts)) => {
                    if !self.running.load(Ordering::Relaxed) {
                        break;
                    }
                    if let Err(e) = self.handle_message(parts) {
                        log::warn!("Dropped analyzer command: {}", e);
                    }
                }
                Ok(Received::Timeout) => {}
                Err(e) => {
                    if !self.running.load(Ordering::Relaxed) {
                        break;
                    }
                    HubStats::bump(&self.state.stats.transport_errors);
                    log::error!("Command receive failed: {}", e);
                    std::thread::sleep(self.error_backoff);
                }
            }
        }

        log::info!("Command receiver stopped");
    }

    /// Process one received message
    pub fn handle_message(&mut self, parts: Multipart) -> Result<()> {
        let (command, body) = match parse_command(parts) {
            Ok(parsed) => parsed,
            Err(e) => {
                HubStats::bump(&self.state.stats.commands_invalid);
                return Err(e);
            }
        };
        HubStats::bump(&self.state.stats.commands_received);

        if command == Command::Unknown {
            HubStats::bump(&self.state.stats.commands_invalid);
            return Err(Error::MalformedMessage("unknown command type".to_string()));
        }

        log::debug!(
            "Analyzer command {} for '{}' (id {:?})",
            command.kind(),
            command.target_id(),
            command.message_id()
        );

        self.forwarder.forward_raw(&command, &body);

        let failures = self.state.callbacks.dispatch_command(&command);
        HubStats::add(&self.state.stats.callback_failures, failures);
        Ok(())
    }
}

/// Decode the single JSON frame, keeping the body for verbatim relay
fn parse_command(parts: Multipart) -> Result<(Command, Vec<u8>)> {
    let [body]: [Vec<u8>; 1] = parts.try_into().map_err(|parts: Multipart| {
        Error::MalformedMessage(format!("expected 1 part, got {}", parts.len()))
    })?;
    std::str::from_utf8(&body)
        .map_err(|_| Error::MalformedMessage("command is not valid UTF-8".to_string()))?;
    let command = Command::from_json(&body)?;
    Ok((command, body))
}
