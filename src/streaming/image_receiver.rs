//! Inbound image receiver
//!
//! Reads `[source_id, payload]` messages from the simulator and, for each
//! well-formed one, in this order:
//!
//! 1. records the source id (first sighting logged)
//! 2. replaces the cached frame of that source
//! 3. offers the frame to the display sink, if any
//! 4. runs frame callbacks
//! 5. re-publishes the frame to the analyzer
//!
//! The payload is never inspected. A poll timeout is normal; transport errors
//! are logged and followed by a short backoff.

use super::forwarder::FrameForwarder;
use crate::config::RuntimeConfig;
use crate::core::types::Frame;
use crate::display::DisplaySink;
use crate::error::{Error, Result};
use crate::state::{HubStats, SharedState};
use crate::transport::{Multipart, Received, Subscriber};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Interval between "waiting" log lines while no frames arrive
const IDLE_LOG_INTERVAL: Duration = Duration::from_secs(10);

pub struct ImageReceiver {
    subscriber: Box<dyn Subscriber>,
    forwarder: FrameForwarder,
    state: Arc<SharedState>,
    display: Option<Arc<DisplaySink>>,
    running: Arc<AtomicBool>,
    poll_timeout: Duration,
    error_backoff: Duration,
}

impl ImageReceiver {
    pub fn new(
        subscriber: Box<dyn Subscriber>,
        forwarder: FrameForwarder,
        state: Arc<SharedState>,
        display: Option<Arc<DisplaySink>>,
        running: Arc<AtomicBool>,
        runtime: &RuntimeConfig,
    ) -> Self {
        Self {
            subscriber,
            forwarder,
            state,
            display,
            running,
            poll_timeout: runtime.poll_timeout(),
            error_backoff: runtime.error_backoff(),
        }
    }

    /// Receive until the running flag is cleared
    pub fn run(mut self) {
        log::info!("Image receiver started");
        let mut last_idle_log = Instant::now();

        while self.running.load(Ordering::Relaxed) {
            match self.subscriber.recv(self.poll_timeout) {
                Ok(Received::Message(parts)) => {
                    if !self.running.load(Ordering::Relaxed) {
                        break;
                    }
                    if let Err(e) = self.handle_message(parts) {
                        log::warn!("Dropped image message: {}", e);
                    }
                }
                Ok(Received::Timeout) => {
                    if last_idle_log.elapsed() >= IDLE_LOG_INTERVAL {
                        log::info!(
                            "Waiting for image frames... ({} received so far)",
                            self.state.stats.frames_received.load(Ordering::Relaxed)
                        );
                        last_idle_log = Instant::now();
                    }
                }
                Err(e) => {
                    if !self.running.load(Ordering::Relaxed) {
                        break;
                    }
                    HubStats::bump(&self.state.stats.transport_errors);
                    log::error!("Image receive failed: {}", e);
                    std::thread::sleep(self.error_backoff);
                }
            }
        }

        log::info!("Image receiver stopped");
    }

    /// Process one received message
    pub fn handle_message(&mut self, parts: Multipart) -> Result<()> {
        let (source_id, payload) = match parse_image(parts) {
            Ok(frame) => frame,
            Err(e) => {
                HubStats::bump(&self.state.stats.frames_malformed);
                return Err(e);
            }
        };
        HubStats::bump(&self.state.stats.frames_received);
        log::trace!("Received {} bytes from {}", payload.len(), source_id);

        if self.state.sources.insert(&source_id) {
            log::info!(
                "New source discovered: {} ({} known)",
                source_id,
                self.state.sources.len()
            );
        }

        let frame = Frame::new(source_id, payload);
        self.state.frames.insert(frame.clone());

        if let Some(display) = &self.display
            && !display.enqueue(frame.clone())
        {
            HubStats::bump(&self.state.stats.display_drops);
        }

        let failures = self
            .state
            .callbacks
            .dispatch_frame(&frame.source_id, &frame.payload);
        HubStats::add(&self.state.stats.callback_failures, failures);

        self.forwarder.forward(&frame.source_id, &frame.payload);
        Ok(())
    }
}

/// Split a message into source id and payload
///
/// Exactly two parts are accepted and the first must be UTF-8.
fn parse_image(parts: Multipart) -> Result<(String, Bytes)> {
    let [source_id, payload]: [Vec<u8>; 2] = parts.try_into().map_err(|parts: Multipart| {
        Error::MalformedMessage(format!("expected 2 parts, got {}", parts.len()))
    })?;
    let source_id = String::from_utf8(source_id)
        .map_err(|_| Error::MalformedMessage("source id is not valid UTF-8".to_string()))?;
    Ok((source_id, Bytes::from(payload)))
}
