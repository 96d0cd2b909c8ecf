//! Error types for Setu

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Setu error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZeroMQ transport error
    #[error("Transport error: {0}")]
    Transport(#[from] zmq::Error),

    /// Socket could not be bound to its endpoint
    #[error("Failed to bind {endpoint}: {reason}")]
    Bind {
        /// Endpoint that was requested
        endpoint: String,
        /// Transport-specific failure description
        reason: String,
    },

    /// Configuration could not be parsed or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encode/decode failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decode or encode failure
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Message did not match the wire contract
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Operation not valid in the hub's current lifecycle state
    #[error("Invalid hub state: {0}")]
    InvalidState(&'static str),

    /// Worker threads that did not exit within the join timeout
    #[error("Threads did not stop in time: {}", .0.join(", "))]
    JoinTimeout(Vec<String>),

    /// Peer side of an in-memory channel is gone
    #[error("Channel disconnected: {0}")]
    Disconnected(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
