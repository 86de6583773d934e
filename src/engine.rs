//! Action engine: auto-fire state and the action sequence
//!
//! An action sequence activates the target window, plays the circular stick
//! gesture, taps the A button, then puts the previous window and the cursor
//! back. Sequences are serialized: the lock around the input sink is held for
//! the whole transaction.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{Settings, SettingsError};
use crate::gesture::CircularTurn;
use crate::input_simulator::{GamepadButton, InputSink};
use crate::scheduler::Shutdown;
use crate::window_tracker::{TargetTracker, TargetWindow, WindowHandle, WindowSystem};
use crate::AntiAfkError;

/// Wait after requesting focus, scaled by `speed_multiplier`
pub const ACTIVATION_SETTLE: Duration = Duration::from_millis(300);

/// Wait between the gesture and the button press, scaled by `speed_multiplier`
pub const PRE_BUTTON_DELAY: Duration = Duration::from_millis(100);

/// How long the button stays down
pub const BUTTON_HOLD: Duration = Duration::from_millis(100);

/// Receives engine notifications for a control surface
pub trait EngineObserver: Send + Sync {
    fn on_status(&self, message: &str);

    /// Auto-fire switched on or off
    fn on_icon_state(&self, _enabled: bool) {}
}

/// Observer that writes status updates to the log
pub struct TracingObserver;

impl EngineObserver for TracingObserver {
    fn on_status(&self, message: &str) {
        info!("Status: {}", message);
    }

    fn on_icon_state(&self, enabled: bool) {
        debug!("Icon state: {}", if enabled { "on" } else { "off" });
    }
}

/// How an action sequence ended. None of these stop auto-fire.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Completed,
    TargetUnavailable,
    ActivationFailed,
    InputFailed(String),
    /// Shutdown arrived mid-sequence; focus and cursor were still restored
    Interrupted,
}

#[derive(Debug)]
struct AutoFireState {
    enabled: bool,
    /// Ignored while disabled
    next_fire_at: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `interval_secs` from now, saturating far in the future
fn deadline_after(interval_secs: u64) -> Instant {
    let now = Instant::now();
    now.checked_add(Duration::from_secs(interval_secs))
        .or_else(|| now.checked_add(Duration::from_secs(u64::from(u32::MAX))))
        .unwrap_or(now)
}

fn scaled(base: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Owns the auto-fire state, the target and the virtual gamepad
pub struct ActionEngine {
    settings: RwLock<Settings>,
    auto: Mutex<AutoFireState>,
    tracker: TargetTracker,
    /// `None` when no virtual gamepad could be created; input is skipped
    sink: Mutex<Option<Box<dyn InputSink>>>,
    observers: RwLock<Vec<Arc<dyn EngineObserver>>>,
    /// Every wait inside a sequence wakes on this
    shutdown: Arc<Shutdown>,
}

impl ActionEngine {
    pub fn new(
        settings: Settings,
        system: Arc<dyn WindowSystem>,
        sink: Option<Box<dyn InputSink>>,
    ) -> Self {
        Self {
            settings: RwLock::new(settings),
            auto: Mutex::new(AutoFireState {
                enabled: false,
                next_fire_at: Instant::now(),
            }),
            tracker: TargetTracker::new(system),
            sink: Mutex::new(sink),
            observers: RwLock::new(Vec::new()),
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Share the process stop signal so a running sequence can be cut short
    pub fn with_shutdown(mut self, shutdown: Arc<Shutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn subscribe(&self, observer: Arc<dyn EngineObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn observers(&self) -> Vec<Arc<dyn EngineObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish a status line to every observer
    pub fn report_status(&self, message: &str) {
        for observer in self.observers() {
            observer.on_status(message);
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validated settings write; rejected values leave the old one in place
    pub fn update_setting(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let result = self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set(key, value);
        match &result {
            Ok(()) => {
                let shown = self.settings().get(key).unwrap_or_default();
                self.report_status(&format!("{} set to {}", setting_label(key), shown));
            }
            Err(e) => self.report_status(&format!("Invalid value: {}", e)),
        }
        result
    }

    pub fn has_gamepad(&self) -> bool {
        lock(&self.sink).is_some()
    }

    pub fn target(&self) -> Option<TargetWindow> {
        self.tracker.snapshot()
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.auto).enabled
    }

    /// Flip auto-fire. Enabling schedules the first fire one interval out.
    pub fn toggle_auto(&self) -> bool {
        let interval = self.settings().interval;
        let enabled = {
            let mut auto = lock(&self.auto);
            auto.enabled = !auto.enabled;
            if auto.enabled {
                auto.next_fire_at = deadline_after(interval);
            }
            auto.enabled
        };

        self.report_status(if enabled {
            "Auto Action: ON"
        } else {
            "Auto Action: OFF"
        });
        for observer in self.observers() {
            observer.on_icon_state(enabled);
        }
        enabled
    }

    /// Time until the next auto-fire, `None` while auto-fire is off
    pub fn time_remaining(&self) -> Option<Duration> {
        let auto = lock(&self.auto);
        auto.enabled
            .then(|| auto.next_fire_at.saturating_duration_since(Instant::now()))
    }

    /// Report the countdown as a status message
    pub fn show_time(&self) {
        match self.time_remaining() {
            Some(left) => self.report_status(&format!("Next action in: {}s", left.as_secs())),
            None => self.report_status("Auto action is OFF"),
        }
    }

    /// Fire if auto-fire is on and the deadline has passed at `now`.
    ///
    /// The next deadline is measured from the end of the sequence.
    pub fn poll_due(&self, now: Instant) -> bool {
        let due = {
            let auto = lock(&self.auto);
            auto.enabled && now >= auto.next_fire_at
        };
        if !due {
            return false;
        }

        debug!("Auto-fire due");
        self.fire_action();
        let interval = self.settings().interval;
        lock(&self.auto).next_fire_at = deadline_after(interval);
        true
    }

    /// Run one action sequence on its own thread, regardless of auto-fire
    pub fn manual_fire(self: &Arc<Self>) -> JoinHandle<ActionOutcome> {
        let engine = Arc::clone(self);
        thread::spawn(move || engine.fire_action())
    }

    /// Capture the foreground window as the new target
    pub fn set_target(&self) -> bool {
        match self.tracker.set_from_foreground() {
            Ok(target) => {
                self.report_status(&format!("Target window set to: {}", target.title));
                true
            }
            Err(e) => {
                self.report_status(&format!("Error setting window: {}", e));
                false
            }
        }
    }

    /// Check the stored target is still a live window, clearing it if not
    pub fn test_target(&self) -> bool {
        match self.tracker.validate() {
            Some(target) => {
                self.report_status(&format!("Success! Target is '{}'", target.title));
                true
            }
            None => {
                self.report_status("Failure: Target window not set or has been closed.");
                false
            }
        }
    }

    /// Run the action sequence once. Never fails outward.
    pub fn fire_action(&self) -> ActionOutcome {
        let mut sink = lock(&self.sink);

        let Some(target) = self.resolve_target() else {
            return ActionOutcome::TargetUnavailable;
        };

        if self.shutdown.is_triggered() {
            return ActionOutcome::Interrupted;
        }

        let settings = self.settings();
        let system = self.tracker.system();
        let initial_cursor = system.cursor_position();
        let previous = system.foreground_window();

        let outcome = match self.activate(system, target.handle, settings.speed_multiplier) {
            Err(outcome) => outcome,
            Ok(()) => match sink.as_deref_mut() {
                Some(sink) => {
                    let shutdown = &self.shutdown;
                    let played = panic::catch_unwind(AssertUnwindSafe(|| {
                        play(sink, &settings, shutdown)
                    }));
                    match played {
                        Ok(Ok(false)) => {
                            self.report_status("Action interrupted by shutdown");
                            ActionOutcome::Interrupted
                        }
                        Ok(Ok(true)) => {
                            self.report_status(&format!("Actions sent to: {}", target.title));
                            ActionOutcome::Completed
                        }
                        Ok(Err(e)) => {
                            self.report_status(&format!("Error during actions: {}", e));
                            ActionOutcome::InputFailed(e.to_string())
                        }
                        Err(_) => {
                            self.report_status("Error during actions: input injection panicked");
                            ActionOutcome::InputFailed("input injection panicked".to_string())
                        }
                    }
                }
                None => {
                    warn!("Virtual gamepad unavailable, skipping input");
                    self.report_status(&format!(
                        "Virtual gamepad unavailable, no input sent to: {}",
                        target.title
                    ));
                    ActionOutcome::Completed
                }
            },
        };

        self.restore(system, previous, initial_cursor);
        outcome
    }

    fn resolve_target(&self) -> Option<TargetWindow> {
        if self.tracker.snapshot().is_none() {
            self.report_status("Target window not set");
            return None;
        }
        let target = self.tracker.validate();
        if target.is_none() {
            self.report_status("Target window no longer exists.");
        }
        target
    }

    fn activate(
        &self,
        system: &dyn WindowSystem,
        handle: WindowHandle,
        speed: f64,
    ) -> Result<(), ActionOutcome> {
        if system.is_minimized(handle) && !system.restore_from_minimized(handle) {
            debug!("Restore request for {} was not sent", handle);
        }
        if !system.bring_to_foreground(handle) {
            self.report_status(&format!("Window activation error: could not activate {}", handle));
            return Err(ActionOutcome::ActivationFailed);
        }
        if self.shutdown.wait_timeout(scaled(ACTIVATION_SETTLE, speed)) {
            self.report_status("Action interrupted by shutdown");
            return Err(ActionOutcome::Interrupted);
        }

        if system.foreground_window() != Some(handle) {
            self.report_status("Failed to bring target window to foreground");
            return Err(ActionOutcome::ActivationFailed);
        }
        Ok(())
    }

    fn restore(
        &self,
        system: &dyn WindowSystem,
        previous: Option<WindowHandle>,
        cursor: Option<(i32, i32)>,
    ) {
        if let Some(previous) = previous {
            if system.is_window_valid(previous)
                && system.foreground_window() != Some(previous)
                && !system.bring_to_foreground(previous)
            {
                self.report_status("Could not restore the previous window");
            }
        }
        if let Some(position) = cursor {
            if !system.set_cursor_position(position) {
                self.report_status("Could not restore the cursor position");
            }
        }
    }
}

/// Gesture, short pause, then an A tap.
///
/// Returns `Ok(false)` when shutdown cut the sequence short. A pressed button
/// is always released.
fn play(
    sink: &mut dyn InputSink,
    settings: &Settings,
    shutdown: &Shutdown,
) -> Result<bool, AntiAfkError> {
    let turn = CircularTurn {
        loops: settings.circle_loops,
        radius: settings.circle_radius,
        duration: scaled(Duration::from_secs(1), settings.action_duration),
    };
    turn.play(sink, |delay| shutdown.wait_timeout(delay))?;
    if shutdown.is_triggered()
        || shutdown.wait_timeout(scaled(PRE_BUTTON_DELAY, settings.speed_multiplier))
    {
        return Ok(false);
    }

    sink.press_button(GamepadButton::A)?;
    sink.commit()?;
    shutdown.wait_timeout(BUTTON_HOLD);
    sink.release_button(GamepadButton::A)?;
    sink.commit()?;
    Ok(true)
}

/// "speed_multiplier" -> "Speed multiplier"
fn setting_label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
