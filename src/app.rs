//! Application wiring: engine, hotkeys and the settings file

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::config::{ActionName, Config, HotkeyBindings, SettingsStore};
use crate::engine::ActionEngine;
use crate::hotkey::{
    format_hotkey, parse_hotkey, CaptureSession, CaptureState, HotkeyHandle, HotkeyService,
};
use crate::scheduler::Shutdown;
use crate::AntiAfkError;

/// A hotkey rebind waiting for the user to press a combination
pub struct Rebind {
    capture: CaptureSession,
    worker: JoinHandle<()>,
}

impl Rebind {
    pub fn capture(&self) -> &CaptureSession {
        &self.capture
    }

    /// Abandon the rebind; the old binding is re-registered
    pub fn cancel(&self) -> bool {
        self.capture.cancel()
    }

    /// Wait until the new binding is saved and hotkeys are live again
    pub fn wait(self) -> CaptureState {
        let _ = self.worker.join();
        self.capture.state()
    }
}

/// Everything a control surface talks to
pub struct App {
    engine: Arc<ActionEngine>,
    hotkeys: Arc<dyn HotkeyService>,
    store: SettingsStore,
    bindings: Mutex<HotkeyBindings>,
    registered: Mutex<Vec<(ActionName, HotkeyHandle)>>,
    rebinding: AtomicBool,
    shutdown: Arc<Shutdown>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl App {
    pub fn new(
        engine: Arc<ActionEngine>,
        hotkeys: Arc<dyn HotkeyService>,
        store: SettingsStore,
        bindings: HotkeyBindings,
        shutdown: Arc<Shutdown>,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            hotkeys,
            store,
            bindings: Mutex::new(bindings),
            registered: Mutex::new(Vec::new()),
            rebinding: AtomicBool::new(false),
            shutdown,
        })
    }

    pub fn engine(&self) -> &Arc<ActionEngine> {
        &self.engine
    }

    pub fn bindings(&self) -> HotkeyBindings {
        lock(&self.bindings).clone()
    }

    pub fn is_rebinding(&self) -> bool {
        self.rebinding.load(Ordering::SeqCst)
    }

    /// Run the operation bound to `action`
    pub fn dispatch(&self, action: ActionName) {
        debug!("Dispatching {}", action);
        match action {
            ActionName::ToggleAuto => {
                self.engine.toggle_auto();
            }
            ActionName::ManualAction => {
                // Detached; the engine serializes overlapping fires
                let _ = self.engine.manual_fire();
            }
            ActionName::ShowTime => self.engine.show_time(),
            ActionName::SetWindow => {
                self.engine.set_target();
            }
            ActionName::ExitApp => self.request_exit(),
        }
    }

    pub fn request_exit(&self) {
        info!("Exit requested");
        self.shutdown.trigger();
    }

    /// Drop every live registration
    fn suspend_hotkeys(&self) {
        for (_, handle) in lock(&self.registered).drain(..) {
            self.hotkeys.unregister(handle);
        }
    }

    /// (Re)register all bindings. Failures are reported per binding and
    /// leave the other bindings active.
    pub fn register_hotkeys(self: &Arc<Self>) -> Vec<(ActionName, AntiAfkError)> {
        self.suspend_hotkeys();

        let mut failures = Vec::new();
        let mut registered = Vec::new();
        for (action, spec) in self.bindings().iter() {
            let app: Weak<Self> = Arc::downgrade(self);
            let callback = Arc::new(move || {
                if let Some(app) = app.upgrade() {
                    app.dispatch(action);
                }
            });
            match self.hotkeys.register(spec, callback) {
                Ok(handle) => registered.push((action, handle)),
                Err(e) => {
                    self.engine
                        .report_status(&format!("Failed to set hotkey '{}': {}", spec, e));
                    failures.push((action, e));
                }
            }
        }

        info!("{} hotkeys registered", registered.len());
        *lock(&self.registered) = registered;
        failures
    }

    /// Listen for a new combination for `action`.
    ///
    /// Hotkeys are suspended until the capture completes or is cancelled.
    /// Only one rebind runs at a time.
    pub fn rebind(self: &Arc<Self>, action: ActionName) -> Result<Rebind, AntiAfkError> {
        if self.rebinding.swap(true, Ordering::SeqCst) {
            return Err(AntiAfkError::CaptureInProgress);
        }

        self.suspend_hotkeys();
        self.engine.report_status("Press a key combination...");
        let capture = self.hotkeys.capture_next();

        let app = Arc::clone(self);
        let session = capture.clone();
        let worker = thread::spawn(move || {
            match session.wait() {
                CaptureState::Completed(spec) => app.apply_binding(action, spec),
                _ => app.engine.report_status("Hotkey change cancelled"),
            }
            app.register_hotkeys();
            app.rebinding.store(false, Ordering::SeqCst);
        });

        Ok(Rebind { capture, worker })
    }

    fn apply_binding(&self, action: ActionName, spec: String) {
        if parse_hotkey(&spec).is_none() {
            warn!("Captured hotkey '{}' cannot be read back, keeping the old one", spec);
            self.engine
                .report_status(&format!("Unsupported hotkey '{}', keeping the old one", spec));
            return;
        }
        let shown = format_hotkey(&spec);
        lock(&self.bindings).set(action, spec);
        self.engine
            .report_status(&format!("New hotkey set to '{}'.", shown));
        let _ = self.save();
    }

    /// Validate, apply and persist one setting
    pub fn update_setting(&self, key: &str, value: &str) -> Result<(), AntiAfkError> {
        self.engine.update_setting(key, value)?;
        self.save()
    }

    /// Write current settings and bindings to disk
    pub fn save(&self) -> Result<(), AntiAfkError> {
        let config = Config {
            settings: self.engine.settings(),
            hotkeys: self.bindings(),
        };
        self.store.save(&config).map_err(|e| {
            error!("Failed to save config: {}", e);
            self.engine
                .report_status(&format!("Error saving config: {}", e));
            e
        })
    }
}
