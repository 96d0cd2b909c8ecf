//! Test utilities for Setu integration tests.
//!
//! Hubs here run on the in-memory transport, so tests never touch the network.

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use setu::transport::{MemoryBus, MemoryPublisher, MemorySubscriber};
use setu::{HubConfig, RelayHub};
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Poll timeout used by test hubs
pub const POLL_TIMEOUT_MS: u64 = 50;

/// Default config with a short poll so tests stop quickly.
pub fn test_config() -> HubConfig {
    let mut config = HubConfig::default();
    config.hub.poll_timeout_ms = POLL_TIMEOUT_MS;
    config.hub.error_backoff_ms = 10;
    config.hub.join_timeout_ms = 2000;
    config
}

/// The far side of each hub socket.
pub struct Peers {
    /// Plays the simulator publishing frames
    pub simulator_images: MemoryPublisher,
    /// Plays the simulator listening for commands
    pub simulator_control: MemorySubscriber,
    /// Plays the analyzer listening for frames
    pub analyzer_images: MemorySubscriber,
    /// Plays the analyzer publishing commands
    pub analyzer_control: MemoryPublisher,
}

impl Peers {
    pub fn new(bus: &MemoryBus, config: &HubConfig) -> Self {
        Self {
            simulator_images: bus.peer_publisher(&config.simulator.image_endpoint()),
            simulator_control: bus.peer_subscriber(&config.simulator.control_endpoint()),
            analyzer_images: bus.peer_subscriber(&config.analyzer.image_endpoint()),
            analyzer_control: bus.peer_publisher(&config.analyzer.control_endpoint()),
        }
    }

    /// Publish a two-part image message as the simulator would.
    pub fn send_frame(&mut self, source_id: &str, payload: &[u8]) {
        self.simulator_images
            .send_parts(vec![source_id.as_bytes().to_vec(), payload.to_vec()])
            .unwrap();
    }
}

/// Hub on a fresh bus plus the peers around it. Not started.
pub fn memory_hub(config: HubConfig) -> (RelayHub, MemoryBus, Peers) {
    let bus = MemoryBus::default();
    let peers = Peers::new(&bus, &config);
    let hub = RelayHub::with_factory(config, Arc::new(bus.clone())).unwrap();
    (hub, bus, peers)
}

/// Wait for `condition` to hold, giving up after `timeout`.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Solid-colour PNG of the given size.
pub fn png_frame(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 90, 160])));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}
