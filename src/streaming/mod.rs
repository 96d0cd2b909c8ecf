//! Relay threads between the simulator and analyzer buses
//!
//! | Thread | Reads | Writes |
//! |--------|-------|--------|
//! | `image-receiver` | simulator images (SUB) | analyzer images (PUB) |
//! | `command-receiver` | analyzer commands (SUB) | simulator control (PUB) |
//!
//! The simulator control publisher is also used by `RelayHub::send_command`,
//! so [`CommandForwarder`] is shared behind a mutex. Everything else is
//! owned by a single thread.

mod command_receiver;
mod forwarder;
mod image_receiver;

pub use command_receiver::CommandReceiver;
pub use forwarder::{CommandForwarder, FrameForwarder};
pub use image_receiver::ImageReceiver;
