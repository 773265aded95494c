//! Waits for an incoming file to stop changing before it is analyzed.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// Outcome of [`StabilityWaiter::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Size and mtime held still for the whole window.
    Stable,
    /// The file was removed while waiting.
    Vanished,
    /// Shutdown was requested while waiting.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    len: u64,
    modified: Option<SystemTime>,
}

fn snapshot(path: &Path) -> std::io::Result<Option<Snapshot>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(Snapshot {
            len: meta.len(),
            modified: meta.modified().ok(),
        })),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone)]
pub struct StabilityWaiter {
    window: Duration,
    poll: Duration,
}

impl StabilityWaiter {
    pub fn new(window: Duration, poll: Duration) -> Self {
        Self {
            window,
            poll: poll.max(Duration::from_millis(1)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Polls `path` until its size and mtime are unchanged for the window.
    pub fn wait(&self, path: &Path, shutdown: &AtomicBool) -> std::io::Result<Stability> {
        let Some(mut last) = snapshot(path)? else {
            return Ok(Stability::Vanished);
        };
        let mut settled_since = Instant::now();

        loop {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(Stability::Interrupted);
            }
            if settled_since.elapsed() >= self.window {
                return Ok(Stability::Stable);
            }

            std::thread::sleep(self.poll);

            match snapshot(path)? {
                None => return Ok(Stability::Vanished),
                Some(current) if current != last => {
                    last = current;
                    settled_since = Instant::now();
                }
                Some(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    fn waiter(window_ms: u64) -> StabilityWaiter {
        StabilityWaiter::new(Duration::from_millis(window_ms), Duration::from_millis(10))
    }

    #[test]
    fn test_static_file_is_stable_after_window() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report1.pdf");
        std::fs::write(&file, b"%PDF-1.7").unwrap();

        let started = Instant::now();
        let result = waiter(100).wait(&file, &AtomicBool::new(false)).unwrap();

        assert_eq!(result, Stability::Stable);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_missing_file_vanished() {
        let dir = tempfile::tempdir().unwrap();
        let result = waiter(50)
            .wait(&dir.path().join("gone.pdf"), &AtomicBool::new(false))
            .unwrap();
        assert_eq!(result, Stability::Vanished);
    }

    #[test]
    fn test_file_deleted_while_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report1.pdf");
        std::fs::write(&file, b"%PDF").unwrap();

        let to_remove = file.clone();
        let remover = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            std::fs::remove_file(to_remove).unwrap();
        });

        let result = waiter(2_000).wait(&file, &AtomicBool::new(false)).unwrap();
        remover.join().unwrap();
        assert_eq!(result, Stability::Vanished);
    }

    #[test]
    fn test_growing_file_resets_window() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report1.pdf");
        std::fs::write(&file, b"a").unwrap();

        let to_grow = file.clone();
        let writer = std::thread::spawn(move || {
            let mut handle = std::fs::OpenOptions::new()
                .append(true)
                .open(to_grow)
                .unwrap();
            for _ in 0..5 {
                std::thread::sleep(Duration::from_millis(40));
                handle.write_all(b"more").unwrap();
                handle.flush().unwrap();
            }
        });

        let started = Instant::now();
        let result = waiter(150).wait(&file, &AtomicBool::new(false)).unwrap();
        writer.join().unwrap();

        assert_eq!(result, Stability::Stable);
        // Last append lands ~200ms in; the window restarts from there.
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_shutdown_interrupts() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report1.pdf");
        std::fs::write(&file, b"%PDF").unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::Relaxed);
        });

        let result = waiter(10_000).wait(&file, &shutdown).unwrap();
        assert_eq!(result, Stability::Interrupted);
    }
}
