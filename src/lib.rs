//! Setu - image/command relay between a simulator and an analyzer
//!
//! The hub binds four ZeroMQ sockets. Image frames published by the simulator
//! are cached, observed and re-published to the analyzer; JSON commands
//! published by the analyzer are relayed to the simulator. Both directions
//! are best effort.
//!
//! ```no_run
//! use setu::{HubConfig, RelayHub};
//!
//! let hub = RelayHub::new(HubConfig::default())?;
//! hub.register_frame_callback(|source_id, payload| {
//!     println!("{}: {} bytes", source_id, payload.len());
//! });
//! hub.start()?;
//! hub.send_command("Camera01", (100.0, 200.0, 300.0), (0.0, 90.0, 0.0), None);
//! hub.stop()?;
//! # Ok::<(), setu::Error>(())
//! ```

pub mod config;
pub mod core;
pub mod display;
pub mod error;
pub mod hub;
pub mod state;
pub mod streaming;
pub mod threads;
pub mod transport;

// Re-export commonly used types
pub use config::HubConfig;
pub use crate::core::{CameraTransform, Command, Frame, Location, Rotation};
pub use error::{Error, Result};
pub use hub::RelayHub;
pub use state::StatsSnapshot;
