//! Camera control test client
//!
//! Sends `camera_transform` commands straight to the simulator control port,
//! without a hub in between.
//!
//! # Usage
//!
//! ```bash
//! # move one camera
//! camera-control --camera Camera01 --loc 100 200 300 --rot 0 90 0
//!
//! # address every camera
//! camera-control --broadcast --loc 0 0 300 --rot 0 0 0 --repeat 5
//! ```
//!
//! The client first tries to bind the control port. When that fails (usually
//! because a hub already owns it) it connects to the port instead.

use clap::Parser;
use setu::error::{Error, Result};
use setu::transport::{Delivery, Publisher, SocketFactory, ZmqFactory};
use setu::{Command, HubConfig};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "camera-control")]
#[command(about = "Send camera transform commands to the simulator")]
struct Args {
    /// Camera id to address
    #[arg(short, long, default_value = "Camera01")]
    camera: String,

    /// Address every camera (empty camera id)
    #[arg(long)]
    broadcast: bool,

    /// Location X Y Z
    #[arg(long, num_args = 3, required = true, allow_negative_numbers = true, value_names = ["X", "Y", "Z"])]
    loc: Vec<f64>,

    /// Rotation PITCH YAW ROLL in degrees
    #[arg(long, num_args = 3, required = true, allow_negative_numbers = true, value_names = ["PITCH", "YAW", "ROLL"])]
    rot: Vec<f64>,

    /// Seconds to wait for subscribers before sending
    #[arg(long, default_value_t = 0.5)]
    delay: f64,

    /// Number of times to send the command
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Seconds between repeated sends
    #[arg(long, default_value_t = 0.2)]
    interval: f64,

    /// Hub config to read the simulator control port from
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the simulator control port
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => HubConfig::load(path)?,
        None => HubConfig::default(),
    };
    let port = args.port.unwrap_or(config.simulator.control_port);
    let host = match config.simulator.bind_address.as_str() {
        "*" | "" | "0.0.0.0" => "127.0.0.1",
        other => other,
    };

    let factory = ZmqFactory::new(config.hub.send_high_water_mark);
    let mut publisher = open_publisher(&factory, host, port)?;

    log::info!("Waiting {:.1}s for subscribers to connect...", args.delay);
    thread::sleep(seconds(args.delay));

    let camera_id = if args.broadcast { "" } else { args.camera.as_str() };
    let command = Command::camera_transform(
        camera_id,
        (args.loc[0], args.loc[1], args.loc[2]),
        (args.rot[0], args.rot[1], args.rot[2]),
        None,
    );
    let json = command.to_json()?;

    for i in 0..args.repeat {
        match publisher.send(&[json.as_bytes()])? {
            Delivery::Sent => log::info!("[{}/{}] Sent: {}", i + 1, args.repeat, json),
            Delivery::WouldBlock => log::warn!("[{}/{}] Send queue full, dropped", i + 1, args.repeat),
        }
        if i + 1 < args.repeat {
            thread::sleep(seconds(args.interval));
        }
    }

    // Let the socket flush before it is closed
    thread::sleep(Duration::from_millis(100));
    Ok(())
}

/// Bind the control port, falling back to connecting to it
fn open_publisher(factory: &ZmqFactory, host: &str, port: u16) -> Result<Box<dyn Publisher>> {
    let bind_endpoint = format!("tcp://*:{}", port);
    let connect_endpoint = format!("tcp://{}:{}", host, port);

    match factory.bind_publisher(&bind_endpoint) {
        Ok(publisher) => {
            log::info!("Control PUB bound to {}", bind_endpoint);
            Ok(publisher)
        }
        Err(e) => {
            log::warn!("{}. Trying connect to {}", e, connect_endpoint);
            let publisher = factory.connect_publisher(&connect_endpoint).map_err(|e2| {
                Error::Other(format!("connect to {} failed: {}", connect_endpoint, e2))
            })?;
            log::info!("Control PUB connected to {}", connect_endpoint);
            Ok(Box::new(publisher))
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}
