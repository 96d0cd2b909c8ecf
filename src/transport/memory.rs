//! In-process bus for testing and embedding
//!
//! Every endpoint name maps to one bounded crossbeam channel. The hub binds
//! one end through [`SocketFactory`]; tests attach to the other end with
//! [`MemoryBus::peer_publisher`] and [`MemoryBus::peer_subscriber`]. Like a
//! real PUB socket, a full channel drops the message and reports
//! [`Delivery::WouldBlock`].

use super::{
    Delivery, Multipart, Publisher, Received, SocketFactory, Subscriber, matches_topics,
};
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default per-endpoint channel depth
const DEFAULT_CAPACITY: usize = 1000;

/// Shared registry of in-memory endpoints
#[derive(Clone)]
pub struct MemoryBus {
    inner: Arc<Mutex<BusInner>>,
}

struct BusInner {
    capacity: usize,
    channels: HashMap<String, (Sender<Multipart>, Receiver<Multipart>)>,
    bound: HashSet<String>,
    refused: HashSet<String>,
}

impl MemoryBus {
    /// Create a bus whose channels hold `capacity` messages each
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                capacity: capacity.max(1),
                channels: HashMap::new(),
                bound: HashSet::new(),
                refused: HashSet::new(),
            })),
        }
    }

    /// Make every later bind on `endpoint` fail
    pub fn refuse(&self, endpoint: &str) {
        self.inner.lock().refused.insert(endpoint.to_string());
    }

    /// Undo [`MemoryBus::refuse`]
    pub fn allow(&self, endpoint: &str) {
        self.inner.lock().refused.remove(endpoint);
    }

    /// Whether a hub socket currently holds `endpoint`
    pub fn is_bound(&self, endpoint: &str) -> bool {
        self.inner.lock().bound.contains(endpoint)
    }

    /// Publisher feeding a subscriber bound on `endpoint`
    pub fn peer_publisher(&self, endpoint: &str) -> MemoryPublisher {
        let (tx, _) = self.channel(endpoint);
        MemoryPublisher { tx, _guard: None }
    }

    /// Subscriber draining a publisher bound on `endpoint`
    pub fn peer_subscriber(&self, endpoint: &str) -> MemorySubscriber {
        let (_, rx) = self.channel(endpoint);
        MemorySubscriber {
            rx,
            topics: Vec::new(),
            _guard: None,
        }
    }

    fn channel(&self, endpoint: &str) -> (Sender<Multipart>, Receiver<Multipart>) {
        let mut inner = self.inner.lock();
        let capacity = inner.capacity;
        inner
            .channels
            .entry(endpoint.to_string())
            .or_insert_with(|| bounded(capacity))
            .clone()
    }

    fn claim(&self, endpoint: &str) -> Result<BindGuard> {
        let mut inner = self.inner.lock();
        if inner.refused.contains(endpoint) {
            return Err(Error::Bind {
                endpoint: endpoint.to_string(),
                reason: "endpoint refused".to_string(),
            });
        }
        if !inner.bound.insert(endpoint.to_string()) {
            return Err(Error::Bind {
                endpoint: endpoint.to_string(),
                reason: "address already in use".to_string(),
            });
        }
        Ok(BindGuard {
            bus: Arc::clone(&self.inner),
            endpoint: endpoint.to_string(),
        })
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SocketFactory for MemoryBus {
    fn bind_subscriber(&self, endpoint: &str, topics: &[String]) -> Result<Box<dyn Subscriber>> {
        let guard = self.claim(endpoint)?;
        let (_, rx) = self.channel(endpoint);
        log::debug!("memory SUB bound to {}", endpoint);
        Ok(Box::new(MemorySubscriber {
            rx,
            topics: topics.to_vec(),
            _guard: Some(guard),
        }))
    }

    fn bind_publisher(&self, endpoint: &str) -> Result<Box<dyn Publisher>> {
        let guard = self.claim(endpoint)?;
        let (tx, _) = self.channel(endpoint);
        log::debug!("memory PUB bound to {}", endpoint);
        Ok(Box::new(MemoryPublisher {
            tx,
            _guard: Some(guard),
        }))
    }
}

/// Releases a bound endpoint when the owning socket is dropped
struct BindGuard {
    bus: Arc<Mutex<BusInner>>,
    endpoint: String,
}

impl Drop for BindGuard {
    fn drop(&mut self) {
        self.bus.lock().bound.remove(&self.endpoint);
    }
}

/// Sending end of an in-memory endpoint
pub struct MemoryPublisher {
    tx: Sender<Multipart>,
    _guard: Option<BindGuard>,
}

impl Publisher for MemoryPublisher {
    fn send(&mut self, parts: &[&[u8]]) -> Result<Delivery> {
        let message: Multipart = parts.iter().map(|p| p.to_vec()).collect();
        match self.tx.try_send(message) {
            Ok(()) => Ok(Delivery::Sent),
            Err(TrySendError::Full(_)) => Ok(Delivery::WouldBlock),
            Err(TrySendError::Disconnected(_)) => {
                Err(Error::Disconnected("memory publisher".to_string()))
            }
        }
    }
}

impl MemoryPublisher {
    /// Publish a message whose parts are already owned
    pub fn send_parts(&mut self, parts: Multipart) -> Result<Delivery> {
        let borrowed: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
        self.send(&borrowed)
    }
}

/// Receiving end of an in-memory endpoint
pub struct MemorySubscriber {
    rx: Receiver<Multipart>,
    topics: Vec<String>,
    _guard: Option<BindGuard>,
}

impl Subscriber for MemorySubscriber {
    fn recv(&mut self, timeout: Duration) -> Result<Received> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(parts) if matches_topics(&self.topics, &parts) => {
                    return Ok(Received::Message(parts));
                }
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Ok(Received::Timeout),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Disconnected("memory subscriber".to_string()));
                }
            }
        }
    }
}

impl MemorySubscriber {
    /// Drain everything currently queued without waiting
    pub fn drain(&mut self) -> Vec<Multipart> {
        self.rx
            .try_iter()
            .filter(|parts| matches_topics(&self.topics, parts))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_subscriber_receives_peer_messages() {
        let bus = MemoryBus::new(4);
        let mut sub = bus.bind_subscriber("inproc://images", &[]).unwrap();
        let mut peer = bus.peer_publisher("inproc://images");

        assert_eq!(peer.send(&[b"cam".as_slice(), b"data".as_slice()]).unwrap(), Delivery::Sent);
        assert_eq!(
            sub.recv(Duration::from_millis(50)).unwrap(),
            Received::Message(vec![b"cam".to_vec(), b"data".to_vec()])
        );
        assert_eq!(
            sub.recv(Duration::from_millis(10)).unwrap(),
            Received::Timeout
        );
    }

    #[test]
    fn test_full_channel_reports_would_block() {
        let bus = MemoryBus::new(1);
        let mut publisher = bus.bind_publisher("inproc://out").unwrap();

        assert_eq!(publisher.send(&[b"a".as_slice()]).unwrap(), Delivery::Sent);
        assert_eq!(publisher.send(&[b"b".as_slice()]).unwrap(), Delivery::WouldBlock);

        let mut peer = bus.peer_subscriber("inproc://out");
        assert_eq!(peer.drain(), vec![vec![b"a".to_vec()]]);
    }

    #[test]
    fn test_double_bind_fails_until_released() {
        let bus = MemoryBus::default();
        let first = bus.bind_publisher("inproc://dup").unwrap();
        assert!(bus.is_bound("inproc://dup"));
        assert!(matches!(
            bus.bind_publisher("inproc://dup"),
            Err(Error::Bind { .. })
        ));

        drop(first);
        assert!(!bus.is_bound("inproc://dup"));
        assert!(bus.bind_publisher("inproc://dup").is_ok());
    }

    #[test]
    fn test_refused_endpoint() {
        let bus = MemoryBus::default();
        bus.refuse("inproc://busy");
        assert!(matches!(
            bus.bind_subscriber("inproc://busy", &[]),
            Err(Error::Bind { .. })
        ));

        bus.allow("inproc://busy");
        assert!(bus.bind_subscriber("inproc://busy", &[]).is_ok());
    }

    #[test]
    fn test_topic_filter_skips_other_sources() {
        let bus = MemoryBus::default();
        let topics = vec!["Camera02".to_string()];
        let mut sub = bus.bind_subscriber("inproc://filtered", &topics).unwrap();
        let mut peer = bus.peer_publisher("inproc://filtered");

        peer.send(&[b"Camera01".as_slice(), b"x".as_slice()]).unwrap();
        peer.send(&[b"Camera02".as_slice(), b"y".as_slice()]).unwrap();

        match sub.recv(Duration::from_millis(50)).unwrap() {
            Received::Message(parts) => assert_eq!(parts[0], b"Camera02"),
            Received::Timeout => panic!("expected Camera02 frame"),
        }
    }
}
