// Background execution context shared by the layout engines and the bundler.
// One worker owns at most one thread; start/stop are serialized per worker.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Handed to the thread body so it can poll for cancellation and end the run
/// on its own.
#[derive(Clone)]
pub struct RunFlag {
    running: Arc<AtomicBool>,
}

impl RunFlag {
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Marks the run finished from inside the thread.
    #[inline]
    pub fn finish(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Sleeps for what is left of `period` since `started`, waking early in
    /// small slices so a stop request is honoured promptly.
    pub fn pace(&self, started: Instant, period: Duration) {
        const SLICE: Duration = Duration::from_millis(5);
        while self.is_running() {
            let elapsed = started.elapsed();
            if elapsed >= period {
                break;
            }
            thread::sleep((period - elapsed).min(SLICE));
        }
    }
}

/// Clears the run flag when the thread body returns or unwinds.
struct FinishOnExit(RunFlag);

impl Drop for FinishOnExit {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// A restartable background thread with blocking stop.
pub struct BackgroundWorker {
    name: &'static str,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundWorker {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawns `body` unless a run is already in progress. Returns whether a
    /// new thread was started. A previous run that finished on its own is
    /// joined first.
    pub fn start<F>(&self, body: F) -> bool
    where
        F: FnOnce(RunFlag) + Send + 'static,
    {
        let mut handle = self.handle.lock();
        if self.running.load(Ordering::Acquire) {
            tracing::debug!(worker = self.name, "start ignored, already running");
            return false;
        }
        if let Some(finished) = handle.take() {
            Self::join(self.name, finished);
        }

        self.running.store(true, Ordering::Release);
        let flag = RunFlag {
            running: self.running.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("hyphae-{}", self.name))
            .spawn(move || {
                let _finish = FinishOnExit(flag.clone());
                body(flag);
            });

        match spawned {
            Ok(h) => {
                *handle = Some(h);
                true
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                tracing::error!(worker = self.name, error = %e, "failed to spawn worker thread");
                false
            }
        }
    }

    /// Requests a stop and blocks until the thread has exited. At most one
    /// in-flight iteration completes after the request.
    pub fn stop(&self) {
        let mut handle = self.handle.lock();
        self.running.store(false, Ordering::Release);
        if let Some(h) = handle.take() {
            Self::join(self.name, h);
        }
    }

    fn join(name: &'static str, handle: JoinHandle<()>) {
        if handle.join().is_err() {
            tracing::warn!(worker = name, "worker thread panicked");
        }
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_start_is_idempotent_and_stop_blocks() {
        let worker = BackgroundWorker::new("test");
        let ticks = Arc::new(AtomicUsize::new(0));

        let t = ticks.clone();
        assert!(worker.start(move |flag| {
            while flag.is_running() {
                t.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
            }
        }));
        assert!(!worker.start(|_| {}));
        assert!(worker.is_running());

        thread::sleep(Duration::from_millis(20));
        worker.stop();
        assert!(!worker.is_running());
        let after_stop = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_self_finishing_run_can_restart() {
        let worker = BackgroundWorker::new("oneshot");
        let runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let r = runs.clone();
            worker.start(move |_| {
                r.fetch_add(1, Ordering::SeqCst);
            });
            let deadline = Instant::now() + Duration::from_secs(5);
            while worker.is_running() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
        }
        worker.stop();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_worker_thread_is_named() {
        let worker = BackgroundWorker::new("named");
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        assert!(worker.start(move |_| {
            *s.lock() = thread::current().name().map(str::to_string);
        }));
        worker.stop();
        assert_eq!(seen.lock().as_deref(), Some("hyphae-named"));
    }
}
