//! Global hotkeys using rdev
//!
//! Hotkey specs are `+`-joined, case-insensitive strings such as `f1` or
//! `ctrl+o`. One listener thread feeds every key event through
//! [`RdevHotkeyService::handle_event`], which dispatches registered callbacks
//! or completes a pending capture session.

use rdev::{listen, EventType, Key};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::AntiAfkError;

/// Canonical lowercase key names and their rdev keys
const KEY_NAMES: &[(&str, Key)] = &[
    ("a", Key::KeyA),
    ("b", Key::KeyB),
    ("c", Key::KeyC),
    ("d", Key::KeyD),
    ("e", Key::KeyE),
    ("f", Key::KeyF),
    ("g", Key::KeyG),
    ("h", Key::KeyH),
    ("i", Key::KeyI),
    ("j", Key::KeyJ),
    ("k", Key::KeyK),
    ("l", Key::KeyL),
    ("m", Key::KeyM),
    ("n", Key::KeyN),
    ("o", Key::KeyO),
    ("p", Key::KeyP),
    ("q", Key::KeyQ),
    ("r", Key::KeyR),
    ("s", Key::KeyS),
    ("t", Key::KeyT),
    ("u", Key::KeyU),
    ("v", Key::KeyV),
    ("w", Key::KeyW),
    ("x", Key::KeyX),
    ("y", Key::KeyY),
    ("z", Key::KeyZ),
    ("0", Key::Num0),
    ("1", Key::Num1),
    ("2", Key::Num2),
    ("3", Key::Num3),
    ("4", Key::Num4),
    ("5", Key::Num5),
    ("6", Key::Num6),
    ("7", Key::Num7),
    ("8", Key::Num8),
    ("9", Key::Num9),
    ("f1", Key::F1),
    ("f2", Key::F2),
    ("f3", Key::F3),
    ("f4", Key::F4),
    ("f5", Key::F5),
    ("f6", Key::F6),
    ("f7", Key::F7),
    ("f8", Key::F8),
    ("f9", Key::F9),
    ("f10", Key::F10),
    ("f11", Key::F11),
    ("f12", Key::F12),
    ("space", Key::Space),
    ("tab", Key::Tab),
    ("enter", Key::Return),
    ("esc", Key::Escape),
    ("backspace", Key::Backspace),
    ("delete", Key::Delete),
    ("insert", Key::Insert),
    ("home", Key::Home),
    ("end", Key::End),
    ("page up", Key::PageUp),
    ("page down", Key::PageDown),
    ("left", Key::LeftArrow),
    ("right", Key::RightArrow),
    ("up", Key::UpArrow),
    ("down", Key::DownArrow),
    ("caps lock", Key::CapsLock),
    ("print screen", Key::PrintScreen),
    ("scroll lock", Key::ScrollLock),
    ("pause", Key::Pause),
    ("-", Key::Minus),
    ("=", Key::Equal),
    ("[", Key::LeftBracket),
    ("]", Key::RightBracket),
    (";", Key::SemiColon),
    ("'", Key::Quote),
    ("\\", Key::BackSlash),
    (",", Key::Comma),
    (".", Key::Dot),
    ("/", Key::Slash),
    ("`", Key::BackQuote),
];

fn parse_key(name: &str) -> Option<Key> {
    let name = match name {
        "return" => "enter",
        "escape" => "esc",
        "del" => "delete",
        "pageup" | "pgup" => "page up",
        "pagedown" | "pgdn" => "page down",
        "capslock" => "caps lock",
        other => other,
    };
    KEY_NAMES
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, key)| *key)
}

fn key_name(key: Key) -> Option<&'static str> {
    KEY_NAMES
        .iter()
        .find(|(_, known)| *known == key)
        .map(|(name, _)| *name)
}

/// A parsed key combination
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotkeySpec {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl HotkeySpec {
    fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self {
            key,
            ctrl: modifiers.ctrl,
            shift: modifiers.shift,
            alt: modifiers.alt,
            meta: modifiers.meta,
        }
    }

    fn matches(&self, key: Key, modifiers: Modifiers) -> bool {
        self.key == key
            && self.ctrl == modifiers.ctrl
            && self.shift == modifiers.shift
            && self.alt == modifiers.alt
            && self.meta == modifiers.meta
    }
}

impl FromStr for HotkeySpec {
    type Err = AntiAfkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hotkey(s).ok_or_else(|| AntiAfkError::HotkeyRegistration {
            spec: s.to_string(),
            reason: "unrecognised key combination".to_string(),
        })
    }
}

/// Canonical lowercase form, e.g. `ctrl+shift+f5`
impl fmt::Display for HotkeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modifiers = [
            (self.ctrl, "ctrl"),
            (self.shift, "shift"),
            (self.alt, "alt"),
            (self.meta, "windows"),
        ];
        for (held, name) in modifiers {
            if held {
                write!(f, "{}+", name)?;
            }
        }
        match key_name(self.key) {
            Some(name) => f.write_str(name),
            None => write!(f, "{:?}", self.key),
        }
    }
}

/// Parse a hotkey string like `ctrl+o` into a [`HotkeySpec`].
///
/// Exactly one non-modifier key is required.
pub fn parse_hotkey(s: &str) -> Option<HotkeySpec> {
    let mut modifiers = Modifiers::default();
    let mut key: Option<Key> = None;

    for part in s.split('+') {
        let lower = part.trim().to_ascii_lowercase();
        match lower.as_str() {
            "ctrl" | "control" => modifiers.ctrl = true,
            "shift" => modifiers.shift = true,
            "alt" | "alt gr" => modifiers.alt = true,
            "windows" | "win" | "meta" | "super" | "cmd" => modifiers.meta = true,
            "" => {}
            other => {
                if key.is_some() {
                    return None;
                }
                key = Some(parse_key(other)?);
            }
        }
    }

    key.map(|k| HotkeySpec::with_modifiers(k, modifiers))
}

/// Display form of a spec string: `ctrl+o` -> `Ctrl+O`
pub fn format_hotkey(spec: &str) -> String {
    spec.split('+')
        .map(|part| {
            let part = part.trim().to_lowercase();
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("+")
}

pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

/// Identifies one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyHandle(u64);

impl HotkeyHandle {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Lifecycle of a "press the new hotkey" capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    Listening,
    Completed(String),
    Cancelled,
}

/// Single-shot capture of the next key combination.
///
/// Clones share the same state; the first `complete` or `cancel` wins.
#[derive(Clone)]
pub struct CaptureSession {
    shared: Arc<(Mutex<CaptureState>, Condvar)>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            shared: Arc::new((Mutex::new(CaptureState::Listening), Condvar::new())),
        }
    }

    fn state_lock(&self) -> MutexGuard<'_, CaptureState> {
        self.shared.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CaptureState {
        self.state_lock().clone()
    }

    fn finish(&self, outcome: CaptureState) -> bool {
        let mut state = self.state_lock();
        if *state != CaptureState::Listening {
            return false;
        }
        *state = outcome;
        self.shared.1.notify_all();
        true
    }

    /// Record the captured combination; false if already finished
    pub fn complete(&self, spec: impl Into<String>) -> bool {
        self.finish(CaptureState::Completed(spec.into()))
    }

    /// Abandon the capture; false if already finished
    pub fn cancel(&self) -> bool {
        self.finish(CaptureState::Cancelled)
    }

    /// Block until the session completes or is cancelled
    pub fn wait(&self) -> CaptureState {
        let state = self.state_lock();
        self.shared
            .1
            .wait_while(state, |state| *state == CaptureState::Listening)
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Like [`CaptureSession::wait`], but may return `Listening` on timeout
    pub fn wait_timeout(&self, timeout: Duration) -> CaptureState {
        let state = self.state_lock();
        let (state, _) = self
            .shared
            .1
            .wait_timeout_while(state, timeout, |state| *state == CaptureState::Listening)
            .unwrap_or_else(PoisonError::into_inner);
        state.clone()
    }
}

/// Maps hotkey specs to callbacks
pub trait HotkeyService: Send + Sync {
    fn register(&self, spec: &str, callback: HotkeyCallback) -> Result<HotkeyHandle, AntiAfkError>;

    /// Returns false if the handle was not registered
    fn unregister(&self, handle: HotkeyHandle) -> bool;

    /// Start capturing the next pressed combination
    fn capture_next(&self) -> CaptureSession;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Modifiers {
    ctrl: bool,
    shift: bool,
    alt: bool,
    meta: bool,
}

impl Modifiers {
    /// Update from a modifier key event; false if `key` is not a modifier
    fn apply(&mut self, key: Key, pressed: bool) -> bool {
        match key {
            Key::ControlLeft | Key::ControlRight => self.ctrl = pressed,
            Key::ShiftLeft | Key::ShiftRight => self.shift = pressed,
            Key::Alt | Key::AltGr => self.alt = pressed,
            Key::MetaLeft | Key::MetaRight => self.meta = pressed,
            _ => return false,
        }
        true
    }
}

#[derive(Default)]
struct Registry {
    bindings: Vec<(HotkeyHandle, HotkeySpec, HotkeyCallback)>,
    modifiers: Modifiers,
    /// Non-modifier keys currently down, to ignore auto-repeat
    held: Vec<Key>,
    capture: Option<CaptureSession>,
}

/// Hotkey service fed by a global rdev listener
#[derive(Clone, Default)]
pub struct RdevHotkeyService {
    registry: Arc<Mutex<Registry>>,
}

impl RdevHotkeyService {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start listening for global key events in a background thread.
    ///
    /// The listener is restarted if rdev returns.
    pub fn start_listener(&self) -> thread::JoinHandle<()> {
        let service = self.clone();
        thread::spawn(move || {
            info!("Hotkey listener started");
            loop {
                let listener = service.clone();
                let result = listen(move |event| {
                    listener.handle_event(&event.event_type);
                });

                match result {
                    Ok(()) => warn!("Hotkey listener exited unexpectedly. Restarting shortly"),
                    Err(e) => warn!("Hotkey listener failed: {:?}. Retrying shortly", e),
                }
                thread::sleep(Duration::from_millis(500));
            }
        })
    }

    /// Feed one input event; returns how many callbacks were dispatched.
    ///
    /// Each callback runs on its own thread so a slow operation never holds
    /// up the listener. Callbacks may register or unregister hotkeys.
    pub fn handle_event(&self, event: &EventType) -> usize {
        let callbacks: Vec<HotkeyCallback> = {
            let mut registry = self.registry();
            match *event {
                EventType::KeyPress(key) => {
                    if registry.modifiers.apply(key, true) || registry.held.contains(&key) {
                        return 0;
                    }
                    registry.held.push(key);
                    let modifiers = registry.modifiers;

                    // A cancelled session falls through to normal dispatch
                    if let Some(capture) = registry.capture.take() {
                        if key_name(key).is_none() && capture.state() == CaptureState::Listening {
                            debug!("Key {:?} has no hotkey name, still listening", key);
                            registry.capture = Some(capture);
                            return 0;
                        }
                        let spec = HotkeySpec::with_modifiers(key, modifiers).to_string();
                        if capture.complete(spec.clone()) {
                            debug!("Captured hotkey '{}'", spec);
                            return 0;
                        }
                    }

                    registry
                        .bindings
                        .iter()
                        .filter(|(_, spec, _)| spec.matches(key, modifiers))
                        .map(|(_, _, callback)| Arc::clone(callback))
                        .collect()
                }
                EventType::KeyRelease(key) => {
                    if !registry.modifiers.apply(key, false) {
                        registry.held.retain(|held| *held != key);
                    }
                    return 0;
                }
                _ => return 0,
            }
        };

        let dispatched = callbacks.len();
        for callback in callbacks {
            thread::spawn(move || callback());
        }
        dispatched
    }

    /// Number of live registrations
    pub fn registered_count(&self) -> usize {
        self.registry().bindings.len()
    }
}

impl HotkeyService for RdevHotkeyService {
    fn register(&self, spec: &str, callback: HotkeyCallback) -> Result<HotkeyHandle, AntiAfkError> {
        let parsed: HotkeySpec = spec.parse()?;
        let handle = HotkeyHandle::next();
        self.registry().bindings.push((handle, parsed, callback));
        debug!("Registered hotkey '{}' as {:?}", parsed, handle);
        Ok(handle)
    }

    fn unregister(&self, handle: HotkeyHandle) -> bool {
        let mut registry = self.registry();
        let before = registry.bindings.len();
        registry.bindings.retain(|(registered, _, _)| *registered != handle);
        registry.bindings.len() != before
    }

    fn capture_next(&self) -> CaptureSession {
        let session = CaptureSession::new();
        let mut registry = self.registry();
        if let Some(previous) = registry.capture.replace(session.clone()) {
            previous.cancel();
        }
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn wait_for(hits: &AtomicUsize, expected: usize) {
        let started = Instant::now();
        while hits.load(Ordering::SeqCst) < expected && started.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn parse_simple_f_key() {
        let hk = parse_hotkey("F2").expect("should parse F2");
        assert_eq!(hk.key, Key::F2);
        assert!(!hk.ctrl && !hk.shift && !hk.alt && !hk.meta);
    }

    #[test]
    fn parse_combo_hotkey() {
        let hk = parse_hotkey("Ctrl+Shift+Space").expect("should parse combination");
        assert_eq!(hk.key, Key::Space);
        assert!(hk.ctrl && hk.shift && !hk.alt);
        assert_eq!(hk.to_string(), "ctrl+shift+space");
    }

    #[test]
    fn parse_invalid_hotkey() {
        assert!(parse_hotkey("Ctrl+Foo").is_none());
        assert!(parse_hotkey("Ctrl+Shift").is_none());
        assert!(parse_hotkey("a+b").is_none());
    }

    #[test]
    fn format_capitalizes_each_part() {
        assert_eq!(format_hotkey("ctrl+o"), "Ctrl+O");
        assert_eq!(format_hotkey("f1"), "F1");
    }

    #[test]
    fn modifiers_must_match_exactly() {
        let service = RdevHotkeyService::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        service
            .register("f1", Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        service.handle_event(&EventType::KeyPress(Key::ControlLeft));
        assert_eq!(service.handle_event(&EventType::KeyPress(Key::F1)), 0);
        service.handle_event(&EventType::KeyRelease(Key::F1));
        service.handle_event(&EventType::KeyRelease(Key::ControlLeft));

        assert_eq!(service.handle_event(&EventType::KeyPress(Key::F1)), 1);
        // auto-repeat while held
        assert_eq!(service.handle_event(&EventType::KeyPress(Key::F1)), 0);
        wait_for(&hits, 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn slow_callback_does_not_hold_up_the_listener() {
        let service = RdevHotkeyService::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        service
            .register("f2", Arc::new(move || {
                thread::sleep(Duration::from_millis(500));
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        let started = Instant::now();
        for _ in 0..2 {
            assert_eq!(service.handle_event(&EventType::KeyPress(Key::F2)), 1);
            service.handle_event(&EventType::KeyRelease(Key::F2));
        }
        assert!(started.elapsed() < Duration::from_millis(250));

        wait_for(&hits, 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn capture_skips_keys_without_a_name() {
        let service = RdevHotkeyService::new();
        let session = service.capture_next();

        service.handle_event(&EventType::KeyPress(Key::Unknown(999)));
        assert_eq!(session.state(), CaptureState::Listening);
        service.handle_event(&EventType::KeyRelease(Key::Unknown(999)));

        service.handle_event(&EventType::KeyPress(Key::F7));
        assert_eq!(session.state(), CaptureState::Completed("f7".to_string()));
    }

    #[test]
    fn capture_consumes_the_next_combination() {
        let service = RdevHotkeyService::new();
        let session = service.capture_next();
        assert_eq!(session.state(), CaptureState::Listening);

        service.handle_event(&EventType::KeyPress(Key::ShiftLeft));
        service.handle_event(&EventType::KeyPress(Key::KeyK));
        assert_eq!(session.state(), CaptureState::Completed("shift+k".to_string()));
    }

    #[test]
    fn new_capture_cancels_the_previous_one() {
        let service = RdevHotkeyService::new();
        let first = service.capture_next();
        let second = service.capture_next();
        assert_eq!(first.state(), CaptureState::Cancelled);
        assert_eq!(second.state(), CaptureState::Listening);
        assert!(!first.complete("f5"));
    }
}
