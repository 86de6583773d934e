//! Background auto-fire loop

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

use crate::engine::ActionEngine;

/// How often the loop checks whether a fire is due
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Process-wide stop signal that also wakes sleeping waiters
#[derive(Default)]
pub struct Shutdown {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep up to `timeout`, returning early (with `true`) on shutdown
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = self
            .wake
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }

    /// Block until shutdown is triggered
    pub fn wait(&self) {
        let stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let _stopped = self
            .wake
            .wait_while(stopped, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Polls the engine and fires when a deadline passes
pub struct Scheduler {
    handle: thread::JoinHandle<()>,
}

impl Scheduler {
    /// Start the loop on a background thread
    pub fn spawn(engine: Arc<ActionEngine>, shutdown: Arc<Shutdown>) -> Self {
        Self::spawn_with_interval(engine, shutdown, POLL_INTERVAL)
    }

    pub fn spawn_with_interval(
        engine: Arc<ActionEngine>,
        shutdown: Arc<Shutdown>,
        poll_interval: Duration,
    ) -> Self {
        let handle = thread::spawn(move || {
            info!("Scheduler started");

            while !shutdown.is_triggered() {
                engine.poll_due(Instant::now());
                if shutdown.wait_timeout(poll_interval) {
                    break;
                }
            }

            info!("Scheduler stopped");
        });
        Self { handle }
    }

    /// Wait for the loop to exit after shutdown was triggered
    pub fn join(self) {
        let _ = self.handle.join();
    }
}
