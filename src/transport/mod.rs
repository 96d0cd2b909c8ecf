//! Transport layer for bus I/O abstraction
//!
//! Both buses are best-effort, at-most-once publish/subscribe channels. The
//! traits here make that explicit: a send either goes out or reports
//! [`Delivery::WouldBlock`], and a receive returns a message, a timeout, or an
//! error. Nothing is queued or retried above this layer.
//!
//! Two implementations are provided:
//!
//! | Factory | Sockets | Use |
//! |---------|---------|-----|
//! | [`ZmqFactory`] | ZeroMQ SUB/PUB over TCP | Production |
//! | [`MemoryBus`] | Bounded crossbeam channels | Tests, embedding |

use crate::error::Result;
use std::time::Duration;

mod memory;
mod zeromq;

pub use self::memory::{MemoryBus, MemoryPublisher, MemorySubscriber};
pub use self::zeromq::{ZmqFactory, ZmqPublisher, ZmqSubscriber};

/// One multipart message as received from the wire
pub type Multipart = Vec<Vec<u8>>;

/// Outcome of a non-blocking publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the transport
    Sent,
    /// Outbound queue full; the message was dropped
    WouldBlock,
}

/// Outcome of a bounded receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Message(Multipart),
    /// Nothing arrived within the poll timeout
    Timeout,
}

/// Subscribing end of a bus
pub trait Subscriber: Send {
    /// Wait up to `timeout` for the next multipart message
    fn recv(&mut self, timeout: Duration) -> Result<Received>;
}

/// Publishing end of a bus
pub trait Publisher: Send {
    /// Publish without blocking
    fn send(&mut self, parts: &[&[u8]]) -> Result<Delivery>;
}

/// Creates and binds the hub's sockets
///
/// Called from `RelayHub::start`, so binding happens when the hub starts and
/// not when it is constructed.
pub trait SocketFactory: Send + Sync {
    /// Bind a subscriber; `topics` are prefix filters on the first frame,
    /// empty subscribes to everything
    fn bind_subscriber(&self, endpoint: &str, topics: &[String]) -> Result<Box<dyn Subscriber>>;

    /// Bind a publisher
    fn bind_publisher(&self, endpoint: &str) -> Result<Box<dyn Publisher>>;
}

/// Prefix match used by subscribers to filter on the first frame
pub(crate) fn matches_topics(topics: &[String], parts: &[Vec<u8>]) -> bool {
    if topics.is_empty() {
        return true;
    }
    let first = parts.first().map(Vec::as_slice).unwrap_or(&[]);
    topics.iter().any(|t| first.starts_with(t.as_bytes()))
}
