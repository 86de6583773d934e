//! Protocol constants and magic numbers used across the crate

/// X11 / EWMH constants
pub mod x11 {
    /// Source indication for _NET_ACTIVE_WINDOW (2 = pager/direct user action)
    pub const ACTIVE_WINDOW_SOURCE_PAGER: u32 = 2;

    /// WM_STATE value for an iconified (minimized) window
    pub const ICONIC_STATE: u32 = 3;

    /// Maximum number of 32-bit units requested for title properties
    pub const TITLE_PROPERTY_LENGTH: u32 = 256;
}

/// Linux input / uinput constants (linux/input-event-codes.h, linux/uinput.h)
pub mod input {
    pub const EV_SYN: u16 = 0x00;
    pub const EV_KEY: u16 = 0x01;
    pub const EV_ABS: u16 = 0x03;

    pub const SYN_REPORT: u16 = 0;

    /// Key press event value
    pub const KEY_PRESS: i32 = 1;

    /// Key release event value
    pub const KEY_RELEASE: i32 = 0;

    pub const BTN_SOUTH: u16 = 0x130;
    pub const BTN_EAST: u16 = 0x131;
    pub const BTN_NORTH: u16 = 0x133;
    pub const BTN_WEST: u16 = 0x134;
    pub const BTN_START: u16 = 0x13b;
    pub const BTN_SELECT: u16 = 0x13a;

    pub const ABS_X: u16 = 0x00;
    pub const ABS_Y: u16 = 0x01;
    pub const ABS_RX: u16 = 0x03;
    pub const ABS_RY: u16 = 0x04;

    /// Stick axis range reported by an Xbox 360 pad
    pub const AXIS_MIN: i32 = -32768;
    pub const AXIS_MAX: i32 = 32767;

    pub const BUS_USB: u16 = 0x03;
    pub const X360_VENDOR_ID: u16 = 0x045e;
    pub const X360_PRODUCT_ID: u16 = 0x028e;

    pub const UINPUT_MAX_NAME_SIZE: usize = 80;
    pub const ABS_CNT: usize = 64;

    /// _IOW('U', 100, int)
    pub const UI_SET_EVBIT: u64 = 0x4004_5564;
    /// _IOW('U', 101, int)
    pub const UI_SET_KEYBIT: u64 = 0x4004_5565;
    /// _IOW('U', 103, int)
    pub const UI_SET_ABSBIT: u64 = 0x4004_5567;
    /// _IO('U', 1)
    pub const UI_DEV_CREATE: u64 = 0x5501;
    /// _IO('U', 2)
    pub const UI_DEV_DESTROY: u64 = 0x5502;
}

/// Filesystem paths
pub mod paths {
    /// uinput character device
    pub const UINPUT_DEVICE: &str = "/dev/uinput";

    /// Config file name, created beside the executable
    pub const CONFIG_FILE_NAME: &str = "options.ini";

    /// Environment variable overriding the config file location
    pub const CONFIG_ENV_VAR: &str = "ANTIAFK_CONFIG";

    /// Environment variable enabling debug logging
    pub const VERBOSE_ENV_VAR: &str = "ANTIAFK_VERBOSE";
}

/// Permission hints shown when the virtual gamepad cannot be created
pub mod permissions {
    pub const INPUT_GROUP: &str = "input";
    pub const ADD_TO_INPUT_GROUP: &str = "sudo usermod -aG input $USER";
}
