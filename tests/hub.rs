//! End-to-end relay tests on the in-memory transport.

mod common;

use bytes::Bytes;
use common::{POLL_TIMEOUT_MS, memory_hub, png_frame, test_config, wait_until};
use parking_lot::Mutex;
use serde_json::Value;
use setu::display::{FrameRenderer, LogRenderer};
use setu::{Command, Error};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

type FrameLog = Arc<Mutex<Vec<(String, Bytes)>>>;

fn record_frames(hub: &setu::RelayHub) -> FrameLog {
    let log: FrameLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    hub.register_frame_callback(move |id, payload| {
        sink.lock().push((id.to_string(), payload.clone()));
    });
    log
}

// ============================================================================
// Image path
// ============================================================================

#[test]
fn test_repeated_frames_keep_latest_and_register_once() {
    let (hub, _bus, mut peers) = memory_hub(test_config());
    let seen = record_frames(&hub);
    hub.start().unwrap();

    for i in 0..20u8 {
        peers.send_frame("Camera01", &[i; 8]);
    }
    assert!(wait_until(WAIT, || seen.lock().len() == 20));

    let latest = hub.latest_frame("Camera01").unwrap();
    assert_eq!(latest.payload, Bytes::from(vec![19u8; 8]));
    assert_eq!(latest.size, 8);
    assert_eq!(hub.known_sources(), vec!["Camera01"]);

    assert!(wait_until(WAIT, || hub.stats().frames_forwarded == 20));
    let forwarded = peers.analyzer_images.drain();
    assert_eq!(forwarded.len(), 20);
    assert_eq!(forwarded[0], vec![b"Camera01".to_vec(), vec![0u8; 8]]);
    assert_eq!(forwarded[19][1], vec![19u8; 8]);

    hub.stop().unwrap();
}

#[test]
fn test_malformed_frames_never_reach_cache_or_callbacks() {
    let (hub, _bus, mut peers) = memory_hub(test_config());
    let seen = record_frames(&hub);
    hub.start().unwrap();

    peers.simulator_images.send_parts(vec![]).unwrap();
    peers
        .simulator_images
        .send_parts(vec![b"Camera01".to_vec()])
        .unwrap();
    peers.send_frame("Camera02", b"valid");

    assert!(wait_until(WAIT, || seen.lock().len() == 1));
    assert!(wait_until(WAIT, || hub.stats().frames_malformed == 2));
    assert!(hub.latest_frame("Camera01").is_none());
    assert_eq!(hub.known_sources(), vec!["Camera02"]);
    assert_eq!(seen.lock()[0].0, "Camera02");

    hub.stop().unwrap();
}

#[test]
fn test_interleaved_sources_pair_correctly() {
    let (hub, _bus, mut peers) = memory_hub(test_config());
    let seen = record_frames(&hub);
    hub.start().unwrap();

    for i in 0..10u8 {
        let source = if i % 2 == 0 { "Camera01" } else { "Camera02" };
        peers.send_frame(source, &[i]);
    }
    assert!(wait_until(WAIT, || seen.lock().len() == 10));

    for (i, (source, payload)) in seen.lock().iter().enumerate() {
        let expected = if i % 2 == 0 { "Camera01" } else { "Camera02" };
        assert_eq!(source, expected);
        assert_eq!(&payload[..], &[i as u8]);
    }
    assert_eq!(hub.known_sources(), vec!["Camera01", "Camera02"]);
    assert_eq!(hub.latest_frames().len(), 2);
    assert_eq!(&hub.latest_frame("Camera02").unwrap().payload[..], &[9]);

    hub.stop().unwrap();
}

#[test]
fn test_panicking_callback_is_isolated() {
    let (hub, _bus, mut peers) = memory_hub(test_config());
    hub.register_frame_callback(|id, _| {
        if id == "Camera01" {
            panic!("callback rejected {}", id);
        }
    });
    let seen = record_frames(&hub);
    hub.start().unwrap();

    peers.send_frame("Camera01", b"a");
    peers.send_frame("Camera02", b"b");
    peers.send_frame("Camera01", b"c");

    assert!(wait_until(WAIT, || seen.lock().len() == 3));
    assert!(wait_until(WAIT, || hub.stats().callback_failures == 2));
    assert!(wait_until(WAIT, || hub.stats().frames_forwarded == 3));
    assert_eq!(peers.analyzer_images.drain().len(), 3);

    hub.stop().unwrap();
}

#[test]
fn test_subscribe_ids_filter_sources() {
    let mut config = test_config();
    config.simulator.subscribe_ids = vec!["Camera02".to_string()];
    let (hub, _bus, mut peers) = memory_hub(config);
    let seen = record_frames(&hub);
    hub.start().unwrap();

    peers.send_frame("Camera01", b"skip");
    peers.send_frame("Camera02", b"keep");

    assert!(wait_until(WAIT, || seen.lock().len() == 1));
    thread::sleep(Duration::from_millis(POLL_TIMEOUT_MS));
    assert_eq!(hub.known_sources(), vec!["Camera02"]);

    hub.stop().unwrap();
}

// ============================================================================
// Command path
// ============================================================================

#[test]
fn test_send_command_publishes_once() {
    let (hub, _bus, mut peers) = memory_hub(test_config());
    hub.start().unwrap();

    let id = hub.send_command("Camera01", (100.0, 200.0, 300.0), (0.0, 90.0, 0.0), None);

    let sent = peers.simulator_control.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].len(), 1);

    let value: Value = serde_json::from_slice(&sent[0][0]).unwrap();
    assert_eq!(value["type"], "camera_transform");
    assert_eq!(value["camera_id"], "Camera01");
    assert_eq!(value["location"]["x"].as_f64(), Some(100.0));
    assert_eq!(value["location"]["y"].as_f64(), Some(200.0));
    assert_eq!(value["location"]["z"].as_f64(), Some(300.0));
    assert_eq!(value["rotation"]["pitch"].as_f64(), Some(0.0));
    assert_eq!(value["rotation"]["yaw"].as_f64(), Some(90.0));
    assert_eq!(value["rotation"]["roll"].as_f64(), Some(0.0));
    assert!(!id.is_empty());
    assert_eq!(value["message_id"], id.as_str());

    hub.stop().unwrap();
}

#[test]
fn test_send_command_keeps_caller_message_id() {
    let (hub, _bus, mut peers) = memory_hub(test_config());
    hub.start().unwrap();

    let id = hub.send_command("", (0.0, 0.0, 0.0), (0.0, 0.0, 0.0), Some("req-42".into()));
    assert_eq!(id, "req-42");

    let sent = peers.simulator_control.drain();
    let command = Command::from_json(&sent[0][0]).unwrap();
    assert!(command.is_broadcast());
    assert_eq!(command.message_id(), Some("req-42"));

    hub.stop().unwrap();
}

#[test]
fn test_send_command_without_running_hub_is_dropped() {
    let (hub, _bus, mut peers) = memory_hub(test_config());

    let id = hub.send_command("Camera01", (1.0, 2.0, 3.0), (0.0, 0.0, 0.0), None);
    assert!(!id.is_empty());
    assert!(peers.simulator_control.drain().is_empty());
}

#[test]
fn test_analyzer_command_relayed_to_simulator() {
    let (hub, _bus, mut peers) = memory_hub(test_config());
    let targets = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&targets);
    hub.register_command_callback(move |cmd| sink.lock().push(cmd.target_id().to_string()));
    hub.start().unwrap();

    let command = Command::camera_transform("Camera03", (5.0, 6.0, 7.0), (1.0, 2.0, 3.0), None);
    let json = command.to_json().unwrap();
    peers
        .analyzer_control
        .send_parts(vec![b"{broken".to_vec()])
        .unwrap();
    peers
        .analyzer_control
        .send_parts(vec![br#"{"type":"lens_zoom","factor":2}"#.to_vec()])
        .unwrap();
    peers
        .analyzer_control
        .send_parts(vec![json.into_bytes()])
        .unwrap();

    assert!(wait_until(WAIT, || targets.lock().len() == 1));
    assert_eq!(targets.lock()[0], "Camera03");

    let relayed = peers.simulator_control.drain();
    assert_eq!(relayed.len(), 1);
    assert_eq!(Command::from_json(&relayed[0][0]).unwrap(), command);
    assert_eq!(hub.stats().commands_invalid, 2);

    hub.stop().unwrap();
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_stop_returns_within_poll_timeout() {
    let mut config = test_config();
    config.hub.poll_timeout_ms = 200;
    let (hub, bus, mut peers) = memory_hub(config.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    hub.register_frame_callback(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    hub.start().unwrap();
    assert!(hub.is_running());

    // Let both receivers settle into their poll
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    hub.stop().unwrap();
    assert!(started.elapsed() < Duration::from_millis(200 + 500));
    assert!(!hub.is_running());

    peers.send_frame("Camera01", b"late");
    thread::sleep(Duration::from_millis(100));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!bus.is_bound(&config.simulator.image_endpoint()));
    assert!(!bus.is_bound(&config.simulator.control_endpoint()));
    assert!(!bus.is_bound(&config.analyzer.image_endpoint()));
    assert!(!bus.is_bound(&config.analyzer.control_endpoint()));
}

#[test]
fn test_double_start_and_restart() {
    let (hub, _bus, _peers) = memory_hub(test_config());

    hub.start().unwrap();
    hub.start().unwrap();
    assert!(hub.is_running());

    hub.stop().unwrap();
    hub.stop().unwrap();
    assert!(matches!(hub.start(), Err(Error::InvalidState(_))));
}

#[test]
fn test_bind_failure_releases_earlier_sockets() {
    let config = test_config();
    let (hub, bus, _peers) = memory_hub(config.clone());
    bus.refuse(&config.analyzer.control_endpoint());

    assert!(matches!(hub.start(), Err(Error::Bind { .. })));
    assert!(!hub.is_running());
    assert!(!bus.is_bound(&config.simulator.image_endpoint()));
    assert!(!bus.is_bound(&config.simulator.control_endpoint()));
    assert!(!bus.is_bound(&config.analyzer.image_endpoint()));
}

#[test]
fn test_drop_stops_hub() {
    let config = test_config();
    let (hub, bus, _peers) = memory_hub(config.clone());
    hub.start().unwrap();
    assert!(bus.is_bound(&config.simulator.image_endpoint()));

    let endpoint = config.simulator.image_endpoint();
    drop(hub);
    assert!(wait_until(WAIT, || !bus.is_bound(&endpoint)));
}

// ============================================================================
// Display sink
// ============================================================================

struct CountingRenderer(Arc<AtomicUsize>);

impl FrameRenderer for CountingRenderer {
    fn render(
        &mut self,
        _source_id: &str,
        _image: &image::DynamicImage,
        _fps: f32,
    ) -> setu::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_failed_start_keeps_custom_renderer() {
    let mut config = test_config();
    config.display.enabled = true;
    config.display.fps_limit = 0;
    let (hub, bus, mut peers) = memory_hub(config.clone());
    let rendered = Arc::new(AtomicUsize::new(0));
    let hub = hub.with_renderer(Box::new(CountingRenderer(Arc::clone(&rendered))));

    // Occupy the display so start fails after the receivers are up
    let display = hub.display().unwrap();
    display.start(Box::new(LogRenderer)).unwrap();
    assert!(matches!(hub.start(), Err(Error::InvalidState(_))));
    assert!(!hub.is_running());
    assert!(wait_until(WAIT, || !bus.is_bound(&config.simulator.image_endpoint())));
    assert!(!bus.is_bound(&config.simulator.control_endpoint()));
    assert!(display.stop(WAIT).is_none());

    hub.start().unwrap();
    peers.send_frame("Camera01", &png_frame(8, 8));

    assert!(wait_until(WAIT, || rendered.load(Ordering::SeqCst) == 1));
    hub.stop().unwrap();
}

#[test]
fn test_display_renders_relayed_frames() {
    let mut config = test_config();
    config.display.enabled = true;
    config.display.fps_limit = 0;
    let (hub, _bus, mut peers) = memory_hub(config);
    let rendered = Arc::new(AtomicUsize::new(0));
    let hub = hub.with_renderer(Box::new(CountingRenderer(Arc::clone(&rendered))));
    hub.start().unwrap();

    let png = png_frame(16, 12);
    for _ in 0..3 {
        peers.send_frame("Camera01", &png);
    }

    assert!(wait_until(WAIT, || rendered.load(Ordering::SeqCst) == 3));
    let display = hub.display().unwrap();
    assert!(display.fps("Camera01") >= 1.0);
    assert!(wait_until(WAIT, || hub.stats().frames_forwarded == 3));

    hub.stop().unwrap();
}

#[test]
fn test_snapshot_dir_writes_png_per_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.display.enabled = true;
    config.display.window_size = [20, 10];
    config.display.snapshot_dir = Some(dir.path().to_path_buf());
    let (hub, _bus, mut peers) = memory_hub(config);
    hub.start().unwrap();

    peers.send_frame("Camera05", &png_frame(40, 40));

    let path = dir.path().join("Camera05.png");
    assert!(wait_until(WAIT, || path.exists() && image::open(&path).is_ok()));
    let written = image::open(&path).unwrap();
    assert_eq!((written.width(), written.height()), (20, 10));

    hub.stop().unwrap();
}
