//! Core data types for frames and commands.
//!
//! - [`Frame`]: latest image payload of one source, as held by the frame cache
//! - [`Command`]: control message exchanged between the buses, tagged by `type`
//! - [`CameraTransform`]: the `camera_transform` command body

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// One image payload plus metadata, keyed by source id
///
/// The payload is opaque to the hub (normally JPEG or PNG) and is never
/// validated on the relay path.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub source_id: String,
    pub payload: Bytes,
    pub received_at: SystemTime,
    pub size: usize,
}

impl Frame {
    /// Create a frame stamped with the current time
    pub fn new(source_id: impl Into<String>, payload: Bytes) -> Self {
        let size = payload.len();
        Self {
            source_id: source_id.into(),
            payload,
            received_at: SystemTime::now(),
            size,
        }
    }
}

/// Position in simulator world units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<(f64, f64, f64)> for Location {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self { x, y, z }
    }
}

/// Orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl From<(f64, f64, f64)> for Rotation {
    fn from((pitch, yaw, roll): (f64, f64, f64)) -> Self {
        Self { pitch, yaw, roll }
    }
}

/// Move or rotate a camera in the simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraTransform {
    /// Target camera; empty addresses every camera
    #[serde(default)]
    pub camera_id: String,
    pub location: Location,
    pub rotation: Rotation,
    /// Correlation token for higher-level acknowledgement schemes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Fields this build does not model, kept so relaying is lossless
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Control command, tagged by its `type` field on the wire
///
/// Types this build does not know decode to [`Command::Unknown`] so that a
/// newer peer never causes a parse failure; the receiver drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    CameraTransform(CameraTransform),
    #[serde(other)]
    Unknown,
}

impl Command {
    /// Build a `camera_transform` command
    ///
    /// A UUID v4 correlation token is generated when `message_id` is `None`.
    pub fn camera_transform(
        camera_id: impl Into<String>,
        location: impl Into<Location>,
        rotation: impl Into<Rotation>,
        message_id: Option<String>,
    ) -> Self {
        let message_id = message_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Command::CameraTransform(CameraTransform {
            camera_id: camera_id.into(),
            location: location.into(),
            rotation: rotation.into(),
            message_id: Some(message_id),
            extra: serde_json::Map::new(),
        })
    }

    /// Wire tag of this command
    pub fn kind(&self) -> &'static str {
        match self {
            Command::CameraTransform(_) => "camera_transform",
            Command::Unknown => "unknown",
        }
    }

    /// Addressed source id; empty means broadcast
    pub fn target_id(&self) -> &str {
        match self {
            Command::CameraTransform(t) => &t.camera_id,
            Command::Unknown => "",
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        match self {
            Command::CameraTransform(t) => t.message_id.as_deref(),
            Command::Unknown => None,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.target_id().is_empty()
    }

    /// Decode one JSON command frame
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Encode as a single JSON string frame
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
