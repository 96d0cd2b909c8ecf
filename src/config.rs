//! Configuration for the Setu relay hub
//!
//! Loads a TOML snapshot describing both buses, the display sink and logging.
//! Every section is optional; missing values fall back to the defaults the
//! simulator and analyzer plugins ship with.
//!
//! ```toml
//! [simulator]
//! bind_address = "*"
//! image_port = 5555
//! control_port = 5556
//! subscribe_ids = ["Camera01"]
//!
//! [analyzer]
//! bind_address = "*"
//! image_port = 5557
//! control_port = 5558
//!
//! [hub]
//! poll_timeout_ms = 1000
//!
//! [display]
//! enabled = true
//! window_size = [640, 480]
//!
//! [logging]
//! level = "debug"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level hub configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct HubConfig {
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub hub: RuntimeConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulator bus (images in, commands out)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Interface to bind on (`*` = all interfaces)
    pub bind_address: String,
    /// Port the simulator publishes image frames to
    pub image_port: u16,
    /// Port the simulator subscribes to for control commands
    pub control_port: u16,
    /// Source ids to subscribe to; empty subscribes to every source
    pub subscribe_ids: Vec<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bind_address: "*".to_string(),
            image_port: 5555,
            control_port: 5556,
            subscribe_ids: Vec::new(),
        }
    }
}

impl SimulatorConfig {
    /// Endpoint of the inbound image subscription
    pub fn image_endpoint(&self) -> String {
        tcp_endpoint(&self.bind_address, self.image_port)
    }

    /// Endpoint of the outbound command publisher
    pub fn control_endpoint(&self) -> String {
        tcp_endpoint(&self.bind_address, self.control_port)
    }
}

/// Analyzer bus (images out, commands in)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub bind_address: String,
    /// Port frames are re-published on
    pub image_port: u16,
    /// Port the analyzer publishes commands to
    pub control_port: u16,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bind_address: "*".to_string(),
            image_port: 5557,
            control_port: 5558,
        }
    }
}

impl AnalyzerConfig {
    /// Endpoint of the outbound image publisher
    pub fn image_endpoint(&self) -> String {
        tcp_endpoint(&self.bind_address, self.image_port)
    }

    /// Endpoint of the inbound command subscription
    pub fn control_endpoint(&self) -> String {
        tcp_endpoint(&self.bind_address, self.control_port)
    }
}

/// Receiver loop timing and socket tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bounded poll wait; also bounds shutdown latency
    pub poll_timeout_ms: u64,
    /// Sleep after an unexpected transport error
    pub error_backoff_ms: u64,
    /// Per-thread join budget during `stop()`
    pub join_timeout_ms: u64,
    /// Outbound queue depth before publishes report would-block
    pub send_high_water_mark: i32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 1000,
            error_backoff_ms: 100,
            join_timeout_ms: 5000,
            send_high_water_mark: 1000,
        }
    }
}

impl RuntimeConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Optional display sink
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub enabled: bool,
    /// Render size as `[width, height]`
    pub window_size: [u32; 2],
    /// Maximum renders per second per source (0 = unlimited)
    pub fps_limit: u32,
    /// Frames held before new ones are dropped
    pub queue_capacity: usize,
    /// Write the latest frame of each source here as PNG
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_size: [640, 480],
            fps_limit: 30,
            queue_capacity: 10,
            snapshot_dir: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl HubConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu::config::HubConfig;
    ///
    /// let config = HubConfig::load("setu.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: HubConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the hub cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.hub.poll_timeout_ms == 0 {
            return Err(Error::Config(
                "hub.poll_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.display.queue_capacity == 0 {
            return Err(Error::Config(
                "display.queue_capacity must be greater than zero".to_string(),
            ));
        }
        let endpoints = [
            self.simulator.image_endpoint(),
            self.simulator.control_endpoint(),
            self.analyzer.image_endpoint(),
            self.analyzer.control_endpoint(),
        ];
        for (i, endpoint) in endpoints.iter().enumerate() {
            if endpoints[i + 1..].contains(endpoint) {
                return Err(Error::Config(format!(
                    "endpoint {} is used by more than one socket",
                    endpoint
                )));
            }
        }
        Ok(())
    }
}

fn tcp_endpoint(bind_address: &str, port: u16) -> String {
    let host = match bind_address {
        "" | "0.0.0.0" => "*",
        other => other,
    };
    format!("tcp://{}:{}", host, port)
}
