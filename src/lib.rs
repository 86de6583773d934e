//! antiafk - Anti-idle automation for background game windows
//!
//! This library provides components for:
//! - Circular right-stick gesture generation
//! - Virtual gamepad input (uinput)
//! - Target window tracking (X11)
//! - The action engine and its scheduler loop
//! - Settings persistence and global hotkeys

pub mod app;
pub mod config;
pub mod console;
pub mod constants;
pub mod engine;
pub mod gesture;
pub mod hotkey;
pub mod input_simulator;
pub mod logging;
pub mod scheduler;
pub mod window_tracker;

pub use app::App;
pub use config::{ActionName, Config, HotkeyBindings, Settings, SettingsStore};
pub use engine::{ActionEngine, ActionOutcome, EngineObserver, TracingObserver};
pub use hotkey::{CaptureSession, HotkeyHandle, HotkeyService, HotkeySpec, RdevHotkeyService};
pub use input_simulator::{InputSink, UinputGamepad};
pub use scheduler::{Scheduler, Shutdown};
pub use window_tracker::{TargetTracker, TargetWindow, WindowHandle, WindowSystem, X11WindowSystem};

use thiserror::Error;

/// Main error type for antiafk
#[derive(Error, Debug)]
pub enum AntiAfkError {
    #[error("Failed to access input devices: {0}")]
    InputAccess(String),

    #[error("Failed to create virtual device: {0}")]
    VirtualDevice(String),

    #[error("Failed to send input event: {0}")]
    SendEvent(String),

    #[error("Window system error: {0}")]
    WindowSystem(String),

    #[error("Permission denied - add user to 'input' group or grant access to /dev/uinput")]
    PermissionDenied,

    #[error("Config file error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Invalid setting: {0}")]
    InvalidSetting(#[from] config::SettingsError),

    #[error("Failed to register hotkey '{spec}': {reason}")]
    HotkeyRegistration { spec: String, reason: String },

    #[error("A hotkey capture is already in progress")]
    CaptureInProgress,
}
