//! Virtual gamepad input via uinput
//!
//! Creates an Xbox 360 style gamepad through `/dev/uinput`, which games see
//! as a regular controller. Requires write access to `/dev/uinput`
//! (usually membership of the `input` group).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::mem;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use tracing::{debug, info, warn};

use crate::constants::{input, paths};
use crate::AntiAfkError;

/// Gamepad buttons the sink can press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamepadButton {
    A,
    B,
    X,
    Y,
    Start,
    Back,
}

impl GamepadButton {
    const ALL: [GamepadButton; 6] = [
        GamepadButton::A,
        GamepadButton::B,
        GamepadButton::X,
        GamepadButton::Y,
        GamepadButton::Start,
        GamepadButton::Back,
    ];

    fn code(self) -> u16 {
        match self {
            GamepadButton::A => input::BTN_SOUTH,
            GamepadButton::B => input::BTN_EAST,
            GamepadButton::X => input::BTN_WEST,
            GamepadButton::Y => input::BTN_NORTH,
            GamepadButton::Start => input::BTN_START,
            GamepadButton::Back => input::BTN_SELECT,
        }
    }
}

/// Trait for virtual controller implementations
///
/// State changes are buffered until [`InputSink::commit`], mirroring a
/// controller report.
pub trait InputSink: Send {
    /// Set the right stick, both axes in [-1.0, 1.0] with +y pointing up
    fn set_right_stick(&mut self, x: f64, y: f64) -> Result<(), AntiAfkError>;

    fn press_button(&mut self, button: GamepadButton) -> Result<(), AntiAfkError>;

    fn release_button(&mut self, button: GamepadButton) -> Result<(), AntiAfkError>;

    /// Flush buffered changes to the device
    fn commit(&mut self) -> Result<(), AntiAfkError>;
}

#[repr(C)]
struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

/// Legacy `struct uinput_user_dev`, supported by every uinput version
#[repr(C)]
struct UinputUserDev {
    name: [u8; input::UINPUT_MAX_NAME_SIZE],
    id: InputId,
    ff_effects_max: u32,
    absmax: [i32; input::ABS_CNT],
    absmin: [i32; input::ABS_CNT],
    absfuzz: [i32; input::ABS_CNT],
    absflat: [i32; input::ABS_CNT],
}

#[repr(C)]
struct InputEvent {
    time: libc::timeval,
    kind: u16,
    code: u16,
    value: i32,
}

/// View a plain `repr(C)` value as raw bytes for writing to the device
fn as_bytes<T>(value: &T) -> &[u8] {
    // SAFETY: only used with the repr(C) integer structs above, which have no
    // padding-sensitive invariants and are fully initialised.
    unsafe { std::slice::from_raw_parts((value as *const T).cast::<u8>(), mem::size_of::<T>()) }
}

/// Map a stick value in [-1.0, 1.0] onto the device axis range
fn axis_value(value: f64) -> i32 {
    let clamped = value.clamp(-1.0, 1.0);
    if clamped >= 0.0 {
        (clamped * f64::from(input::AXIS_MAX)).round() as i32
    } else {
        (-clamped * f64::from(input::AXIS_MIN)).round() as i32
    }
}

/// Virtual Xbox 360 gamepad backed by a uinput device
pub struct UinputGamepad {
    device: File,
    pending: Vec<InputEvent>,
}

impl UinputGamepad {
    /// Create the virtual gamepad device
    pub fn new() -> Result<Self, AntiAfkError> {
        info!("Creating virtual gamepad...");

        let device = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(paths::UINPUT_DEVICE)
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => AntiAfkError::PermissionDenied,
                _ => AntiAfkError::InputAccess(format!(
                    "Failed to open {}: {}",
                    paths::UINPUT_DEVICE,
                    e
                )),
            })?;

        let fd = device.as_raw_fd();
        let ioctl = |request: u64, arg: libc::c_int, what: &str| -> Result<(), AntiAfkError> {
            // SAFETY: fd is an open uinput descriptor and the request takes an int.
            let rc = unsafe { libc::ioctl(fd, request as _, arg) };
            if rc < 0 {
                return Err(AntiAfkError::VirtualDevice(format!(
                    "{} failed: {}",
                    what,
                    io::Error::last_os_error()
                )));
            }
            Ok(())
        };

        ioctl(input::UI_SET_EVBIT, input::EV_KEY.into(), "UI_SET_EVBIT(EV_KEY)")?;
        for button in GamepadButton::ALL {
            ioctl(input::UI_SET_KEYBIT, button.code().into(), "UI_SET_KEYBIT")?;
        }
        ioctl(input::UI_SET_EVBIT, input::EV_ABS.into(), "UI_SET_EVBIT(EV_ABS)")?;

        let mut setup = UinputUserDev {
            name: [0; input::UINPUT_MAX_NAME_SIZE],
            id: InputId {
                bustype: input::BUS_USB,
                vendor: input::X360_VENDOR_ID,
                product: input::X360_PRODUCT_ID,
                version: 1,
            },
            ff_effects_max: 0,
            absmax: [0; input::ABS_CNT],
            absmin: [0; input::ABS_CNT],
            absfuzz: [0; input::ABS_CNT],
            absflat: [0; input::ABS_CNT],
        };
        let name = b"antiafk virtual gamepad";
        setup.name[..name.len()].copy_from_slice(name);

        for axis in [input::ABS_X, input::ABS_Y, input::ABS_RX, input::ABS_RY] {
            ioctl(input::UI_SET_ABSBIT, axis.into(), "UI_SET_ABSBIT")?;
            setup.absmin[usize::from(axis)] = input::AXIS_MIN;
            setup.absmax[usize::from(axis)] = input::AXIS_MAX;
        }

        let mut device = device;
        device
            .write_all(as_bytes(&setup))
            .map_err(|e| AntiAfkError::VirtualDevice(format!("Failed to write device setup: {}", e)))?;
        ioctl(input::UI_DEV_CREATE, 0, "UI_DEV_CREATE")?;

        info!("Virtual gamepad created successfully");
        Ok(Self {
            device,
            pending: Vec::new(),
        })
    }

    fn queue(&mut self, kind: u16, code: u16, value: i32) {
        self.pending.push(InputEvent {
            time: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            kind,
            code,
            value,
        });
    }
}

impl InputSink for UinputGamepad {
    fn set_right_stick(&mut self, x: f64, y: f64) -> Result<(), AntiAfkError> {
        self.queue(input::EV_ABS, input::ABS_RX, axis_value(x));
        // evdev reports +y as down
        self.queue(input::EV_ABS, input::ABS_RY, axis_value(-y));
        Ok(())
    }

    fn press_button(&mut self, button: GamepadButton) -> Result<(), AntiAfkError> {
        debug!("Pressing {:?}", button);
        self.queue(input::EV_KEY, button.code(), input::KEY_PRESS);
        Ok(())
    }

    fn release_button(&mut self, button: GamepadButton) -> Result<(), AntiAfkError> {
        debug!("Releasing {:?}", button);
        self.queue(input::EV_KEY, button.code(), input::KEY_RELEASE);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), AntiAfkError> {
        self.queue(input::EV_SYN, input::SYN_REPORT, 0);
        let events = mem::take(&mut self.pending);
        for event in &events {
            self.device
                .write_all(as_bytes(event))
                .map_err(|e| AntiAfkError::SendEvent(format!("uinput write failed: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for UinputGamepad {
    fn drop(&mut self) {
        // SAFETY: the descriptor stays open until `device` is dropped after this.
        let rc = unsafe { libc::ioctl(self.device.as_raw_fd(), input::UI_DEV_DESTROY as _) };
        if rc < 0 {
            warn!("Failed to destroy virtual gamepad: {}", io::Error::last_os_error());
        }
    }
}
