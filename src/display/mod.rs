//! Optional display sink
//!
//! The image receiver hands every frame to [`DisplaySink::enqueue`], which
//! never blocks: when the bounded queue is full the incoming frame is dropped.
//! A consumer thread decodes queued frames, updates the per-source frame rate
//! and passes them to a [`FrameRenderer`].
//!
//! ```text
//! image receiver ──try_send──▶ [ bounded queue ] ──recv_timeout──▶ display thread
//!                      │                                            │
//!                  full: drop                           decode → FPS → render
//! ```

mod fps;
mod renderer;

pub use fps::FpsTracker;
pub use renderer::{FrameRenderer, LogRenderer, SnapshotRenderer};

use crate::config::DisplayConfig;
use crate::core::types::Frame;
use crate::error::{Error, Result};
use crate::threads;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Consumer wait between running-flag checks
const CONSUMER_POLL: Duration = Duration::from_millis(100);

pub struct DisplaySink {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    fps_limit: u32,
    fps: Arc<Mutex<FpsTracker>>,
    dropped: AtomicU64,
    rendered: Arc<AtomicU64>,
    decode_failures: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DisplaySink {
    pub fn new(config: &DisplayConfig) -> Self {
        let (tx, rx) = bounded(config.queue_capacity.max(1));
        Self {
            tx,
            rx,
            fps_limit: config.fps_limit,
            fps: Arc::new(Mutex::new(FpsTracker::new())),
            dropped: AtomicU64::new(0),
            rendered: Arc::new(AtomicU64::new(0)),
            decode_failures: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Queue a frame for display without blocking
    ///
    /// Returns false when the frame was dropped because the queue is full.
    pub fn enqueue(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("Display queue full, dropping frame from {}", frame.source_id);
                false
            }
            // rx lives in self, so the channel cannot disconnect
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Frames waiting for the consumer
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the consumer thread is running
    pub fn is_started(&self) -> bool {
        self.handle.lock().is_some()
    }

    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Current frame rate of `source_id` over the last second
    pub fn fps(&self, source_id: &str) -> f32 {
        self.fps.lock().fps(source_id)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Spawn the consumer thread
    pub fn start(&self, renderer: Box<dyn FrameRenderer>) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Err(Error::InvalidState("display sink already started"));
        }

        self.running.store(true, Ordering::Relaxed);
        let consumer = Consumer {
            rx: self.rx.clone(),
            renderer,
            fps: Arc::clone(&self.fps),
            fps_limit: self.fps_limit,
            last_render: HashMap::new(),
            rendered: Arc::clone(&self.rendered),
            decode_failures: Arc::clone(&self.decode_failures),
            running: Arc::clone(&self.running),
        };

        match threads::spawn_named("display", move || consumer.run()) {
            Ok(h) => {
                *handle = Some(h);
                log::info!("Display sink started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Stop the consumer thread, waiting at most `timeout`
    ///
    /// Returns the thread name if it did not exit in time.
    pub fn stop(&self, timeout: Duration) -> Option<String> {
        self.running.store(false, Ordering::Relaxed);
        let handle = self.handle.lock().take()?;
        threads::join_all(vec![handle], timeout).pop()
    }
}

/// State owned by the display thread
struct Consumer {
    rx: Receiver<Frame>,
    renderer: Box<dyn FrameRenderer>,
    fps: Arc<Mutex<FpsTracker>>,
    fps_limit: u32,
    last_render: HashMap<String, Instant>,
    rendered: Arc<AtomicU64>,
    decode_failures: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl Consumer {
    fn run(mut self) {
        log::debug!("Display consumer running");
        while self.running.load(Ordering::Relaxed) {
            match self.rx.recv_timeout(CONSUMER_POLL) {
                Ok(frame) => self.show(frame),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::info!("Display sink stopped");
    }

    fn show(&mut self, frame: Frame) {
        let image = match image::load_from_memory(&frame.payload) {
            Ok(image) => image,
            Err(e) => {
                self.decode_failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("[{}] failed to decode {} byte frame: {}", frame.source_id, frame.size, e);
                return;
            }
        };

        let now = Instant::now();
        let fps = {
            let mut tracker = self.fps.lock();
            tracker.record_at(&frame.source_id, now);
            tracker.fps_at(&frame.source_id, now)
        };

        if self.throttled(&frame.source_id, now) {
            log::trace!("[{}] render skipped by fps limit", frame.source_id);
            return;
        }

        match self.renderer.render(&frame.source_id, &image, fps) {
            Ok(()) => {
                self.rendered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => log::error!("[{}] render failed: {}", frame.source_id, e),
        }
    }

    /// Whether rendering `source_id` now would exceed the fps limit
    fn throttled(&mut self, source_id: &str, now: Instant) -> bool {
        if self.fps_limit == 0 {
            return false;
        }
        let min_interval = Duration::from_secs(1) / self.fps_limit;
        if let Some(last) = self.last_render.get(source_id)
            && now.saturating_duration_since(*last) < min_interval
        {
            return true;
        }
        self.last_render.insert(source_id.to_string(), now);
        false
    }
}

impl Drop for DisplaySink {
    fn drop(&mut self) {
        if self.handle.lock().is_some() {
            self.stop(Duration::from_secs(1));
        }
    }
}
