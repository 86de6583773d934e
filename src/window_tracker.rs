//! Target window tracking
//!
//! Uses X11/EWMH to query and activate windows. Works for both native X11
//! and XWayland windows (like Proton/Wine games).

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ClientMessageEvent, ConnectionExt, EventMask, Window};
use x11rb::rust_connection::RustConnection;

use crate::constants::x11;
use crate::AntiAfkError;

/// Opaque OS window identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u32);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Trait for desktop window-system implementations
///
/// Every query may race with the window closing, so failures surface as
/// `None`/`false` and the caller decides how serious they are.
pub trait WindowSystem: Send + Sync {
    /// Window that currently has input focus
    fn foreground_window(&self) -> Option<WindowHandle>;

    fn is_window_valid(&self, handle: WindowHandle) -> bool;

    fn window_title(&self, handle: WindowHandle) -> Option<String>;

    /// Executable name of the process owning the window
    fn owner_process_name(&self, handle: WindowHandle) -> Option<String>;

    /// Ask the window manager to activate the window
    fn bring_to_foreground(&self, handle: WindowHandle) -> bool;

    fn is_minimized(&self, handle: WindowHandle) -> bool;

    fn restore_from_minimized(&self, handle: WindowHandle) -> bool;

    /// Pointer position in root-window coordinates
    fn cursor_position(&self) -> Option<(i32, i32)>;

    fn set_cursor_position(&self, position: (i32, i32)) -> bool;
}

x11rb::atom_manager! {
    Atoms: AtomsCookie {
        _NET_ACTIVE_WINDOW,
        _NET_WM_NAME,
        _NET_WM_PID,
        _NET_WM_STATE,
        _NET_WM_STATE_HIDDEN,
        WM_STATE,
        UTF8_STRING,
    }
}

/// X11-based window system using EWMH properties
pub struct X11WindowSystem {
    conn: RustConnection,
    root: Window,
    atoms: Atoms,
}

impl X11WindowSystem {
    /// Connect to the display named by `$DISPLAY`
    pub fn new() -> Result<Self, AntiAfkError> {
        let (conn, screen_num) = x11rb::connect(None)
            .map_err(|e| AntiAfkError::WindowSystem(format!("Failed to connect to X11: {}", e)))?;
        let root = conn.setup().roots[screen_num].root;
        let atoms = Atoms::new(&conn)
            .map_err(|e| AntiAfkError::WindowSystem(format!("Failed to intern atoms: {}", e)))?
            .reply()
            .map_err(|e| AntiAfkError::WindowSystem(format!("Failed to intern atoms: {}", e)))?;

        info!("Connected to X11 display (screen {})", screen_num);
        Ok(Self { conn, root, atoms })
    }

    fn property_u32s(&self, window: Window, property: u32, kind: impl Into<u32>, length: u32) -> Option<Vec<u32>> {
        let reply = self
            .conn
            .get_property(false, window, property, kind.into(), 0, length)
            .ok()?
            .reply()
            .ok()?;
        let values = reply.value32()?.collect();
        Some(values)
    }

    fn property_string(&self, window: Window, property: u32, kind: impl Into<u32>) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, property, kind.into(), 0, x11::TITLE_PROPERTY_LENGTH)
            .ok()?
            .reply()
            .ok()?;
        if reply.value.is_empty() {
            return None;
        }
        String::from_utf8(reply.value).ok()
    }

    fn send_active_window_request(&self, window: Window) -> bool {
        let event = ClientMessageEvent::new(
            32,
            window,
            self.atoms._NET_ACTIVE_WINDOW,
            [x11::ACTIVE_WINDOW_SOURCE_PAGER, x11rb::CURRENT_TIME, 0, 0, 0],
        );
        let sent = self
            .conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
                event,
            )
            .is_ok();
        sent && self.conn.flush().is_ok()
    }
}

impl WindowSystem for X11WindowSystem {
    fn foreground_window(&self) -> Option<WindowHandle> {
        let active = self
            .property_u32s(self.root, self.atoms._NET_ACTIVE_WINDOW, AtomEnum::WINDOW, 1)?
            .first()
            .copied()?;
        (active != x11rb::NONE).then_some(WindowHandle(active))
    }

    fn is_window_valid(&self, handle: WindowHandle) -> bool {
        match self.conn.get_window_attributes(handle.0) {
            Ok(cookie) => cookie.reply().is_ok(),
            Err(_) => false,
        }
    }

    fn window_title(&self, handle: WindowHandle) -> Option<String> {
        // Try _NET_WM_NAME first (UTF-8), then legacy WM_NAME
        self.property_string(handle.0, self.atoms._NET_WM_NAME, self.atoms.UTF8_STRING)
            .or_else(|| self.property_string(handle.0, AtomEnum::WM_NAME.into(), AtomEnum::STRING))
    }

    fn owner_process_name(&self, handle: WindowHandle) -> Option<String> {
        let pid = self
            .property_u32s(handle.0, self.atoms._NET_WM_PID, AtomEnum::CARDINAL, 1)?
            .first()
            .copied()?;
        debug!("Window {} belongs to pid {}", handle, pid);
        process_name(pid)
    }

    fn bring_to_foreground(&self, handle: WindowHandle) -> bool {
        self.send_active_window_request(handle.0)
    }

    fn is_minimized(&self, handle: WindowHandle) -> bool {
        let iconic = self
            .property_u32s(handle.0, self.atoms.WM_STATE, self.atoms.WM_STATE, 2)
            .and_then(|state| state.first().copied())
            == Some(x11::ICONIC_STATE);
        let hidden = self
            .property_u32s(handle.0, self.atoms._NET_WM_STATE, AtomEnum::ATOM, 32)
            .is_some_and(|states| states.contains(&self.atoms._NET_WM_STATE_HIDDEN));
        iconic || hidden
    }

    fn restore_from_minimized(&self, handle: WindowHandle) -> bool {
        let mapped = self.conn.map_window(handle.0).is_ok();
        mapped && self.send_active_window_request(handle.0)
    }

    fn cursor_position(&self) -> Option<(i32, i32)> {
        let reply = self.conn.query_pointer(self.root).ok()?.reply().ok()?;
        Some((i32::from(reply.root_x), i32::from(reply.root_y)))
    }

    fn set_cursor_position(&self, (x, y): (i32, i32)) -> bool {
        let (Ok(x), Ok(y)) = (i16::try_from(x), i16::try_from(y)) else {
            return false;
        };
        let warped = self
            .conn
            .warp_pointer(x11rb::NONE, self.root, 0, 0, 0, 0, x, y)
            .is_ok();
        warped && self.conn.flush().is_ok()
    }
}

/// Executable file name for a pid, falling back to the kernel's comm name
fn process_name(pid: u32) -> Option<String> {
    let proc_dir = Path::new("/proc").join(pid.to_string());
    if let Ok(exe) = fs::read_link(proc_dir.join("exe")) {
        if let Some(name) = exe.file_name() {
            return Some(name.to_string_lossy().into_owned());
        }
    }
    fs::read_to_string(proc_dir.join("comm"))
        .ok()
        .map(|comm| comm.trim().to_string())
        .filter(|comm| !comm.is_empty())
}

/// The window actions are directed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetWindow {
    pub handle: WindowHandle,
    pub title: String,
    pub process_name: String,
}

impl fmt::Display for TargetWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.title, self.process_name)
    }
}

/// Why a target could not be captured
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TargetError {
    #[error("Could not get foreground window.")]
    NoForegroundWindow,

    #[error("Could not query the process owning window {0}")]
    ProcessQuery(WindowHandle),
}

/// Holds the selected target and checks that it is still alive
pub struct TargetTracker {
    system: Arc<dyn WindowSystem>,
    target: Mutex<Option<TargetWindow>>,
}

impl TargetTracker {
    pub fn new(system: Arc<dyn WindowSystem>) -> Self {
        Self {
            system,
            target: Mutex::new(None),
        }
    }

    pub fn system(&self) -> &dyn WindowSystem {
        self.system.as_ref()
    }

    fn slot(&self) -> MutexGuard<'_, Option<TargetWindow>> {
        // A poisoned slot still holds a whole TargetWindow, it is replaced wholesale
        self.target.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the target with the current foreground window.
    ///
    /// On failure the target is cleared.
    pub fn set_from_foreground(&self) -> Result<TargetWindow, TargetError> {
        let captured = self.capture_foreground();
        *self.slot() = captured.as_ref().ok().cloned();
        match &captured {
            Ok(target) => info!("Target window set: {} ({})", target, target.handle),
            Err(e) => warn!("Failed to set target window: {}", e),
        }
        captured
    }

    fn capture_foreground(&self) -> Result<TargetWindow, TargetError> {
        let handle = self
            .system
            .foreground_window()
            .ok_or(TargetError::NoForegroundWindow)?;
        let title = self.system.window_title(handle).unwrap_or_default();
        let process_name = self
            .system
            .owner_process_name(handle)
            .ok_or(TargetError::ProcessQuery(handle))?;
        Ok(TargetWindow {
            handle,
            title,
            process_name,
        })
    }

    /// Copy of the current target, if any
    pub fn snapshot(&self) -> Option<TargetWindow> {
        self.slot().clone()
    }

    /// Snapshot the target if its window still exists, clearing it otherwise.
    ///
    /// Only clears the slot if it still holds the window that failed, so a
    /// concurrent `set_from_foreground` is never undone.
    pub fn validate(&self) -> Option<TargetWindow> {
        let target = self.snapshot()?;
        if self.system.is_window_valid(target.handle) {
            return Some(target);
        }
        let mut slot = self.slot();
        if slot.as_ref().map(|t| t.handle) == Some(target.handle) {
            *slot = None;
        }
        info!("Target window {} no longer exists", target.handle);
        None
    }

    pub fn clear(&self) {
        *self.slot() = None;
    }
}
