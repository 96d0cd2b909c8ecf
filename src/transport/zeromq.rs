//! ZeroMQ sockets
//!
//! The hub binds every socket; the simulator and analyzer connect to it.
//!
//! | Socket | Type | Direction |
//! |--------|------|-----------|
//! | simulator image | SUB | simulator → hub |
//! | simulator control | PUB | hub → simulator |
//! | analyzer image | PUB | hub → analyzer |
//! | analyzer control | SUB | analyzer → hub |
//!
//! Linger is zero on every socket so `stop()` never waits on unsent data.

use super::{Delivery, Publisher, Received, SocketFactory, Subscriber};
use crate::error::{Error, Result};
use std::time::Duration;

/// Socket factory backed by one ZeroMQ context
#[derive(Clone)]
pub struct ZmqFactory {
    context: zmq::Context,
    send_high_water_mark: i32,
}

impl ZmqFactory {
    pub fn new(send_high_water_mark: i32) -> Self {
        Self {
            context: zmq::Context::new(),
            send_high_water_mark,
        }
    }

    /// Connect (rather than bind) a publisher to a peer that owns the endpoint
    pub fn connect_publisher(&self, endpoint: &str) -> Result<ZmqPublisher> {
        let socket = self.publisher_socket()?;
        socket.connect(endpoint)?;
        log::debug!("PUB connected to {}", endpoint);
        Ok(ZmqPublisher { socket })
    }

    fn publisher_socket(&self) -> Result<zmq::Socket> {
        let socket = self.context.socket(zmq::PUB)?;
        socket.set_linger(0)?;
        socket.set_sndhwm(self.send_high_water_mark)?;
        Ok(socket)
    }
}

impl SocketFactory for ZmqFactory {
    fn bind_subscriber(&self, endpoint: &str, topics: &[String]) -> Result<Box<dyn Subscriber>> {
        let socket = self.context.socket(zmq::SUB)?;
        socket.set_linger(0)?;
        if topics.is_empty() {
            socket.set_subscribe(b"")?;
        } else {
            for topic in topics {
                socket.set_subscribe(topic.as_bytes())?;
                log::info!("Subscribed to source topic: {}", topic);
            }
        }
        socket.bind(endpoint).map_err(|e| Error::Bind {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        log::info!("SUB bound to {}", endpoint);
        Ok(Box::new(ZmqSubscriber { socket }))
    }

    fn bind_publisher(&self, endpoint: &str) -> Result<Box<dyn Publisher>> {
        let socket = self.publisher_socket()?;
        socket.bind(endpoint).map_err(|e| Error::Bind {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        log::info!("PUB bound to {}", endpoint);
        Ok(Box::new(ZmqPublisher { socket }))
    }
}

/// Bound SUB socket
pub struct ZmqSubscriber {
    socket: zmq::Socket,
}

impl Subscriber for ZmqSubscriber {
    fn recv(&mut self, timeout: Duration) -> Result<Received> {
        let ready = self
            .socket
            .poll(zmq::POLLIN, timeout.as_millis().min(i64::MAX as u128) as i64)?;
        if ready == 0 {
            return Ok(Received::Timeout);
        }
        match self.socket.recv_multipart(zmq::DONTWAIT) {
            Ok(parts) => Ok(Received::Message(parts)),
            Err(zmq::Error::EAGAIN) => Ok(Received::Timeout),
            Err(e) => Err(Error::Transport(e)),
        }
    }
}

/// Bound or connected PUB socket
pub struct ZmqPublisher {
    socket: zmq::Socket,
}

impl Publisher for ZmqPublisher {
    fn send(&mut self, parts: &[&[u8]]) -> Result<Delivery> {
        match self.socket.send_multipart(parts.iter().copied(), zmq::DONTWAIT) {
            Ok(()) => Ok(Delivery::Sent),
            Err(zmq::Error::EAGAIN) => Ok(Delivery::WouldBlock),
            Err(e) => Err(Error::Transport(e)),
        }
    }
}
