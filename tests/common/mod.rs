#![allow(dead_code)]

use antiafk::input_simulator::GamepadButton;
use antiafk::{AntiAfkError, EngineObserver, InputSink, Settings, WindowHandle, WindowSystem};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct FakeWindow {
    handle: WindowHandle,
    title: String,
    process: Option<String>,
    minimized: bool,
}

#[derive(Debug, Default)]
struct Desktop {
    windows: Vec<FakeWindow>,
    foreground: Option<WindowHandle>,
    cursor: (i32, i32),
    refuse_focus: bool,
    activations: Vec<WindowHandle>,
}

/// In-memory window system
#[derive(Default)]
pub struct FakeWindowSystem {
    desktop: Mutex<Desktop>,
}

impl FakeWindowSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self, id: u32, title: &str, process: Option<&str>) -> WindowHandle {
        let handle = WindowHandle(id);
        self.desktop.lock().unwrap().windows.push(FakeWindow {
            handle,
            title: title.to_string(),
            process: process.map(str::to_string),
            minimized: false,
        });
        handle
    }

    pub fn close(&self, handle: WindowHandle) {
        let mut desktop = self.desktop.lock().unwrap();
        desktop.windows.retain(|w| w.handle != handle);
        if desktop.foreground == Some(handle) {
            desktop.foreground = None;
        }
    }

    pub fn focus(&self, handle: WindowHandle) {
        self.desktop.lock().unwrap().foreground = Some(handle);
    }

    pub fn minimize(&self, handle: WindowHandle) {
        let mut desktop = self.desktop.lock().unwrap();
        if let Some(window) = desktop.windows.iter_mut().find(|w| w.handle == handle) {
            window.minimized = true;
        }
    }

    pub fn refuse_focus(&self, refuse: bool) {
        self.desktop.lock().unwrap().refuse_focus = refuse;
    }

    pub fn move_cursor(&self, position: (i32, i32)) {
        self.desktop.lock().unwrap().cursor = position;
    }

    pub fn current_foreground(&self) -> Option<WindowHandle> {
        self.desktop.lock().unwrap().foreground
    }

    pub fn cursor(&self) -> (i32, i32) {
        self.desktop.lock().unwrap().cursor
    }

    pub fn activations(&self) -> Vec<WindowHandle> {
        self.desktop.lock().unwrap().activations.clone()
    }

    fn with_window<T>(&self, handle: WindowHandle, f: impl FnOnce(&FakeWindow) -> T) -> Option<T> {
        let desktop = self.desktop.lock().unwrap();
        desktop.windows.iter().find(|w| w.handle == handle).map(f)
    }
}

impl WindowSystem for FakeWindowSystem {
    fn foreground_window(&self) -> Option<WindowHandle> {
        self.current_foreground()
    }

    fn is_window_valid(&self, handle: WindowHandle) -> bool {
        self.with_window(handle, |_| ()).is_some()
    }

    fn window_title(&self, handle: WindowHandle) -> Option<String> {
        self.with_window(handle, |w| w.title.clone())
    }

    fn owner_process_name(&self, handle: WindowHandle) -> Option<String> {
        self.with_window(handle, |w| w.process.clone()).flatten()
    }

    fn bring_to_foreground(&self, handle: WindowHandle) -> bool {
        let mut desktop = self.desktop.lock().unwrap();
        if !desktop.windows.iter().any(|w| w.handle == handle) {
            return false;
        }
        desktop.activations.push(handle);
        if !desktop.refuse_focus {
            desktop.foreground = Some(handle);
        }
        true
    }

    fn is_minimized(&self, handle: WindowHandle) -> bool {
        self.with_window(handle, |w| w.minimized).unwrap_or(false)
    }

    fn restore_from_minimized(&self, handle: WindowHandle) -> bool {
        let mut desktop = self.desktop.lock().unwrap();
        match desktop.windows.iter_mut().find(|w| w.handle == handle) {
            Some(window) => {
                window.minimized = false;
                true
            }
            None => false,
        }
    }

    fn cursor_position(&self) -> Option<(i32, i32)> {
        Some(self.cursor())
    }

    fn set_cursor_position(&self, position: (i32, i32)) -> bool {
        self.move_cursor(position);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SinkEvent {
    Stick(f64, f64),
    Press(GamepadButton),
    Release(GamepadButton),
    Commit,
}

/// Sink that records every call
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<SinkEvent>>>,
    /// Fail once when `n` events have been recorded
    pub fail_at: Option<usize>,
    /// Panic on the first button press
    pub panic_on_press: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&mut self, event: SinkEvent) -> Result<(), AntiAfkError> {
        let mut events = self.events.lock().unwrap();
        if self.fail_at == Some(events.len()) {
            self.fail_at = None;
            return Err(AntiAfkError::SendEvent("injected failure".to_string()));
        }
        events.push(event);
        Ok(())
    }
}

impl InputSink for RecordingSink {
    fn set_right_stick(&mut self, x: f64, y: f64) -> Result<(), AntiAfkError> {
        self.record(SinkEvent::Stick(x, y))
    }

    fn press_button(&mut self, button: GamepadButton) -> Result<(), AntiAfkError> {
        if self.panic_on_press {
            panic!("controller vanished");
        }
        self.record(SinkEvent::Press(button))
    }

    fn release_button(&mut self, button: GamepadButton) -> Result<(), AntiAfkError> {
        self.record(SinkEvent::Release(button))
    }

    fn commit(&mut self) -> Result<(), AntiAfkError> {
        self.record(SinkEvent::Commit)
    }
}

/// Observer that keeps every status line
#[derive(Default)]
pub struct StatusLog {
    pub messages: Mutex<Vec<String>>,
    pub icon_states: Mutex<Vec<bool>>,
}

impl StatusLog {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.messages.lock().unwrap().last().cloned()
    }
}

impl EngineObserver for StatusLog {
    fn on_status(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn on_icon_state(&self, enabled: bool) {
        self.icon_states.lock().unwrap().push(enabled);
    }
}

/// Settings that keep each action sequence short
pub fn fast_settings() -> Settings {
    Settings {
        interval: 1,
        speed_multiplier: 0.01,
        action_duration: 0.06,
        circle_radius: 0.8,
        circle_loops: 1,
    }
}

/// Events of one complete sequence with `loops` rotations
pub fn expected_sequence(loops: u32, radius: f64) -> Vec<SinkEvent> {
    let turn = antiafk::gesture::CircularTurn {
        loops,
        radius,
        duration: std::time::Duration::ZERO,
    };
    let mut events: Vec<SinkEvent> = turn
        .samples()
        .flat_map(|(x, y)| [SinkEvent::Stick(x, y), SinkEvent::Commit])
        .collect();
    events.extend([
        SinkEvent::Press(GamepadButton::A),
        SinkEvent::Commit,
        SinkEvent::Release(GamepadButton::A),
        SinkEvent::Commit,
    ]);
    events
}
