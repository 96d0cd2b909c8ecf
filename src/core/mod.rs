//! Core types shared by every layer of the hub

pub mod types;

pub use types::{CameraTransform, Command, Frame, Location, Rotation};
