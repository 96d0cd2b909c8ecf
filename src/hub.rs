//! Relay hub lifecycle and public API
//!
//! A [`RelayHub`] owns every socket, thread and piece of state of one relay
//! instance. Nothing is process-global, so several hubs can run side by side
//! on different endpoints.
//!
//! ```text
//! simulator ──images──▶ [SUB] image-receiver ──▶ cache, registry, display, callbacks
//!                                   │
//!                                   └──────────▶ [PUB] ──images──▶ analyzer
//!
//! analyzer ──commands──▶ [SUB] command-receiver ──▶ [PUB] ──commands──▶ simulator
//!                                   │                  ▲
//!                                   ▼                  │
//!                               callbacks        send_command()
//! ```
//!
//! Lifecycle: `new` → `start` (bind, spawn) → `stop` (join, release). A hub
//! that has been stopped cannot be started again.

use crate::config::HubConfig;
use crate::core::types::{Command, Frame, Location, Rotation};
use crate::display::{DisplaySink, FrameRenderer, LogRenderer, SnapshotRenderer};
use crate::error::{Error, Result};
use crate::state::{SharedState, StatsSnapshot};
use crate::streaming::{CommandForwarder, CommandReceiver, FrameForwarder, ImageReceiver};
use crate::threads;
use crate::transport::{Publisher, SocketFactory, Subscriber, ZmqFactory};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

enum Lifecycle {
    Idle,
    Running { threads: Vec<JoinHandle<()>> },
    Stopped,
}

/// The four bound sockets of a running hub
struct Sockets {
    simulator_images: Box<dyn Subscriber>,
    simulator_control: Box<dyn Publisher>,
    analyzer_images: Box<dyn Publisher>,
    analyzer_control: Box<dyn Subscriber>,
}

/// Bidirectional relay between the simulator and analyzer buses
pub struct RelayHub {
    config: HubConfig,
    factory: Arc<dyn SocketFactory>,
    state: Arc<SharedState>,
    display: Option<Arc<DisplaySink>>,
    renderer: Mutex<Option<Box<dyn FrameRenderer>>>,
    running: Arc<AtomicBool>,
    lifecycle: Mutex<Lifecycle>,
    commands: Mutex<Option<CommandForwarder>>,
}

impl RelayHub {
    /// Create a hub that talks ZeroMQ over TCP
    pub fn new(config: HubConfig) -> Result<Self> {
        let factory = ZmqFactory::new(config.hub.send_high_water_mark);
        Self::with_factory(config, Arc::new(factory))
    }

    /// Create a hub whose sockets come from `factory`
    ///
    /// Nothing is bound until [`RelayHub::start`].
    pub fn with_factory(config: HubConfig, factory: Arc<dyn SocketFactory>) -> Result<Self> {
        config.validate()?;
        let display = config
            .display
            .enabled
            .then(|| Arc::new(DisplaySink::new(&config.display)));

        Ok(Self {
            config,
            factory,
            state: Arc::new(SharedState::new()),
            display,
            renderer: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(Lifecycle::Idle),
            commands: Mutex::new(None),
        })
    }

    /// Use `renderer` for the display sink instead of the configured default
    pub fn with_renderer(self, renderer: Box<dyn FrameRenderer>) -> Self {
        *self.renderer.lock() = Some(renderer);
        self
    }

    /// Bind all sockets and spawn the receiver threads
    ///
    /// Calling this on a running hub logs a warning and does nothing. If any
    /// step fails, sockets and threads set up before it are released and the
    /// error is returned; the hub stays startable.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running { .. } => {
                log::warn!("Hub is already running");
                return Ok(());
            }
            Lifecycle::Stopped => {
                return Err(Error::InvalidState("hub has been stopped and cannot be restarted"));
            }
        }

        log::info!("Starting relay hub");
        let sockets = self.bind_sockets()?;

        let commands = CommandForwarder::new(sockets.simulator_control, Arc::clone(&self.state.stats));
        let image_receiver = ImageReceiver::new(
            sockets.simulator_images,
            FrameForwarder::new(sockets.analyzer_images, Arc::clone(&self.state.stats)),
            Arc::clone(&self.state),
            self.display.clone(),
            Arc::clone(&self.running),
            &self.config.hub,
        );
        let command_receiver = CommandReceiver::new(
            sockets.analyzer_control,
            commands.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.running),
            &self.config.hub,
        );

        self.running.store(true, Ordering::Relaxed);
        let handles = match self.spawn_receivers(image_receiver, command_receiver) {
            Ok(handles) => handles,
            Err(e) => {
                log::error!("Failed to spawn receiver thread: {}", e);
                self.running.store(false, Ordering::Relaxed);
                commands.close();
                return Err(e);
            }
        };

        // Taken last: a failed start leaves a custom renderer in place
        if let Some(display) = &self.display
            && let Err(e) = self.start_display(display)
        {
            log::error!("Failed to start display sink: {}", e);
            self.running.store(false, Ordering::Relaxed);
            threads::join_all(handles, self.config.hub.join_timeout());
            commands.close();
            return Err(e);
        }

        *self.commands.lock() = Some(commands);
        *lifecycle = Lifecycle::Running { threads: handles };
        log::info!("Relay hub running");
        Ok(())
    }

    /// Stop every thread and release the sockets
    ///
    /// Waits at most `hub.join_timeout_ms` per call. Threads that do not exit
    /// in time are left detached and reported as [`Error::JoinTimeout`]; the
    /// hub is stopped either way. Stopping a hub that is not running does
    /// nothing.
    pub fn stop(&self) -> Result<()> {
        let handles = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running { threads } => threads,
                other => {
                    *lifecycle = other;
                    return Ok(());
                }
            }
        };

        log::info!("Stopping relay hub");
        self.running.store(false, Ordering::Relaxed);

        let timeout = self.config.hub.join_timeout();
        let mut stuck = threads::join_all(handles, timeout);

        if let Some(commands) = self.commands.lock().take() {
            commands.close();
        }
        if let Some(display) = &self.display
            && let Some(name) = display.stop(timeout)
        {
            stuck.push(name);
        }

        if stuck.is_empty() {
            log::info!("Relay hub stopped");
            Ok(())
        } else {
            Err(Error::JoinTimeout(stuck))
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Observe every well-formed frame from the simulator
    ///
    /// Runs on the image receiver thread and must return quickly.
    pub fn register_frame_callback<F>(&self, callback: F)
    where
        F: Fn(&str, &Bytes) + Send + Sync + 'static,
    {
        self.state.callbacks.register_frame(callback);
    }

    /// Observe every decoded command from the analyzer
    ///
    /// Runs on the command receiver thread after the command was forwarded,
    /// and must return quickly.
    pub fn register_command_callback<F>(&self, callback: F)
    where
        F: Fn(&Command) + Send + Sync + 'static,
    {
        self.state.callbacks.register_command(callback);
    }

    /// Publish a `camera_transform` command to the simulator
    ///
    /// An empty `target_id` addresses every camera. A UUID v4 message id is
    /// generated when none is given; the id used is returned. Delivery is
    /// best effort: failures are logged, never returned.
    pub fn send_command(
        &self,
        target_id: &str,
        location: impl Into<Location>,
        rotation: impl Into<Rotation>,
        message_id: Option<String>,
    ) -> String {
        let command = Command::camera_transform(target_id, location, rotation, message_id);
        let id = command.message_id().unwrap_or_default().to_string();

        let forwarder = self.commands.lock().clone();
        match forwarder {
            Some(forwarder) => {
                if forwarder.forward(&command) {
                    log::info!(
                        "Sent {} to {} (id {})",
                        command.kind(),
                        if command.is_broadcast() { "all cameras" } else { target_id },
                        id
                    );
                }
            }
            None => log::warn!("Hub is not running, dropped {} for '{}'", command.kind(), target_id),
        }
        id
    }

    /// Latest frame received from `source_id`
    pub fn latest_frame(&self, source_id: &str) -> Option<Frame> {
        self.state.frames.get(source_id)
    }

    /// Latest frame of every source
    pub fn latest_frames(&self) -> HashMap<String, Frame> {
        self.state.frames.snapshot()
    }

    /// Source ids seen since the hub was created, sorted
    pub fn known_sources(&self) -> Vec<String> {
        self.state.sources.ids()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.state.stats.snapshot()
    }

    pub fn display(&self) -> Option<&DisplaySink> {
        self.display.as_deref()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn bind_sockets(&self) -> Result<Sockets> {
        let sim = &self.config.simulator;
        let analyzer = &self.config.analyzer;

        // Sockets bound before a failure are dropped, which releases them
        let bound = (|| -> Result<Sockets> {
            Ok(Sockets {
                simulator_images: self
                    .factory
                    .bind_subscriber(&sim.image_endpoint(), &sim.subscribe_ids)?,
                simulator_control: self.factory.bind_publisher(&sim.control_endpoint())?,
                analyzer_images: self.factory.bind_publisher(&analyzer.image_endpoint())?,
                analyzer_control: self
                    .factory
                    .bind_subscriber(&analyzer.control_endpoint(), &[])?,
            })
        })();

        match bound {
            Ok(sockets) => {
                log::info!(
                    "Simulator: images {} / control {}",
                    sim.image_endpoint(),
                    sim.control_endpoint()
                );
                log::info!(
                    "Analyzer: images {} / control {}",
                    analyzer.image_endpoint(),
                    analyzer.control_endpoint()
                );
                Ok(sockets)
            }
            Err(e) => {
                log::error!("Failed to bind hub sockets: {}", e);
                Err(e)
            }
        }
    }

    fn spawn_receivers(
        &self,
        image: ImageReceiver,
        command: CommandReceiver,
    ) -> Result<Vec<JoinHandle<()>>> {
        let image = threads::spawn_named("image-receiver", move || image.run())?;
        match threads::spawn_named("command-receiver", move || command.run()) {
            Ok(command) => Ok(vec![image, command]),
            Err(e) => {
                self.running.store(false, Ordering::Relaxed);
                threads::join_all(vec![image], self.config.hub.join_timeout());
                Err(e)
            }
        }
    }

    fn start_display(&self, display: &DisplaySink) -> Result<()> {
        if display.is_started() {
            return Err(Error::InvalidState("display sink already started"));
        }
        display.start(self.take_renderer()?)
    }

    fn take_renderer(&self) -> Result<Box<dyn FrameRenderer>> {
        if let Some(renderer) = self.renderer.lock().take() {
            return Ok(renderer);
        }
        match &self.config.display.snapshot_dir {
            Some(dir) => {
                log::info!("Writing display snapshots to {}", dir.display());
                Ok(Box::new(SnapshotRenderer::new(dir, self.config.display.window_size)?))
            }
            None => Ok(Box::new(LogRenderer)),
        }
    }
}

impl Drop for RelayHub {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Error stopping relay hub: {}", e);
        }
    }
}
