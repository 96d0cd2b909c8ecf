//! Worker thread helpers shared by the hub and the display sink.

use crate::error::Result;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between `is_finished` checks while joining
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Spawn a named worker thread
pub fn spawn_named<F>(name: &str, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let handle = thread::Builder::new().name(name.to_string()).spawn(body)?;
    Ok(handle)
}

/// Join every handle, waiting no longer than `timeout` in total
///
/// Threads still running at the deadline are left detached; their names are
/// returned so the caller can report them.
pub fn join_all(handles: Vec<JoinHandle<()>>, timeout: Duration) -> Vec<String> {
    let deadline = Instant::now() + timeout;
    let mut stuck = Vec::new();

    for handle in handles {
        let name = handle.thread().name().unwrap_or("unnamed").to_string();
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL_INTERVAL);
        }
        if !handle.is_finished() {
            log::warn!("Thread '{}' did not stop within {:?}", name, timeout);
            stuck.push(name);
            continue;
        }
        if handle.join().is_err() {
            log::error!("Thread '{}' panicked", name);
        } else {
            log::debug!("Thread '{}' joined", name);
        }
    }

    stuck
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_join_all_reports_stuck_threads() {
        let release = Arc::new(AtomicBool::new(false));

        let quick = spawn_named("quick", || {}).unwrap();
        let flag = Arc::clone(&release);
        let slow = spawn_named("slow", move || {
            while !flag.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(5));
            }
        })
        .unwrap();

        let started = Instant::now();
        let stuck = join_all(vec![quick, slow], Duration::from_millis(50));
        assert_eq!(stuck, vec!["slow".to_string()]);
        assert!(started.elapsed() < Duration::from_secs(2));

        release.store(true, Ordering::Relaxed);
    }

    #[test]
    fn test_join_all_survives_panicked_thread() {
        let handle = spawn_named("panicker", || panic!("worker failed")).unwrap();
        assert!(join_all(vec![handle], Duration::from_secs(1)).is_empty());
    }
}
