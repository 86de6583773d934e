//! Configuration management for antiafk
//!
//! Settings and keybinds are persisted in a two-section INI-style file:
//!
//! ```text
//! [Settings]
//! interval = 6
//! speed_multiplier = 1.0
//!
//! [Keybinds]
//! toggle_auto = f1
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::paths;
use crate::hotkey::parse_hotkey;
use crate::AntiAfkError;

const SETTINGS_SECTION: &str = "Settings";
const KEYBINDS_SECTION: &str = "Keybinds";

/// Rejected settings write
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("'{value}' is not a valid {expected} for {key}")]
    Unparsable {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{key} must be {domain}, got {value}")]
    OutOfDomain {
        key: &'static str,
        value: String,
        domain: &'static str,
    },
}

/// Tunable action parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Seconds between auto-fires
    pub interval: u64,

    /// Scales the activation settle and pre-button waits
    pub speed_multiplier: f64,

    /// Seconds taken by one full stick rotation
    pub action_duration: f64,

    /// Stick deflection in (0.0, 1.0]
    pub circle_radius: f64,

    /// Full rotations per action
    pub circle_loops: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: 6,
            speed_multiplier: 1.0,
            action_duration: 1.0,
            circle_radius: 0.8,
            circle_loops: 1,
        }
    }
}

impl Settings {
    pub const KEYS: [&'static str; 5] = [
        "interval",
        "speed_multiplier",
        "action_duration",
        "circle_radius",
        "circle_loops",
    ];

    /// Parse `value` with the type of `key` and store it if it is in range.
    ///
    /// On error the previous value is left untouched.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        match key {
            "interval" => self.interval = parse_positive_int("interval", value)?,
            "circle_loops" => {
                let loops = parse_positive_int("circle_loops", value)?;
                self.circle_loops = u32::try_from(loops).map_err(|_| SettingsError::OutOfDomain {
                    key: "circle_loops",
                    value: value.to_string(),
                    domain: "a positive integer",
                })?;
            }
            "speed_multiplier" => {
                self.speed_multiplier = parse_positive_real("speed_multiplier", value)?
            }
            "action_duration" => self.action_duration = parse_positive_real("action_duration", value)?,
            "circle_radius" => {
                let radius = parse_positive_real("circle_radius", value)?;
                if radius > 1.0 {
                    return Err(SettingsError::OutOfDomain {
                        key: "circle_radius",
                        value: value.to_string(),
                        domain: "in (0.0, 1.0]",
                    });
                }
                self.circle_radius = radius;
            }
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Render a value the way it is written to disk
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "interval" => Some(self.interval.to_string()),
            "speed_multiplier" => Some(format_real(self.speed_multiplier)),
            "action_duration" => Some(format_real(self.action_duration)),
            "circle_radius" => Some(format_real(self.circle_radius)),
            "circle_loops" => Some(self.circle_loops.to_string()),
            _ => None,
        }
    }
}

fn parse_positive_int(key: &'static str, value: &str) -> Result<u64, SettingsError> {
    let parsed: u64 = value.parse().map_err(|_| SettingsError::Unparsable {
        key,
        value: value.to_string(),
        expected: "integer",
    })?;
    if parsed == 0 {
        return Err(SettingsError::OutOfDomain {
            key,
            value: value.to_string(),
            domain: "a positive integer",
        });
    }
    Ok(parsed)
}

fn parse_positive_real(key: &'static str, value: &str) -> Result<f64, SettingsError> {
    let parsed: f64 = value.parse().map_err(|_| SettingsError::Unparsable {
        key,
        value: value.to_string(),
        expected: "number",
    })?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(SettingsError::OutOfDomain {
            key,
            value: value.to_string(),
            domain: "a positive number",
        });
    }
    Ok(parsed)
}

/// Debug formatting keeps a trailing `.0` so reals read back as reals
fn format_real(value: f64) -> String {
    format!("{:?}", value)
}

/// Actions that can be bound to a hotkey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionName {
    ToggleAuto,
    ManualAction,
    ShowTime,
    SetWindow,
    ExitApp,
}

impl ActionName {
    pub const ALL: [ActionName; 5] = [
        ActionName::ToggleAuto,
        ActionName::ManualAction,
        ActionName::ShowTime,
        ActionName::SetWindow,
        ActionName::ExitApp,
    ];

    /// Key used in the config file
    pub fn key(self) -> &'static str {
        match self {
            ActionName::ToggleAuto => "toggle_auto",
            ActionName::ManualAction => "manual_action",
            ActionName::ShowTime => "show_time",
            ActionName::SetWindow => "set_window",
            ActionName::ExitApp => "exit_app",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.key() == key)
    }

    fn default_hotkey(self) -> &'static str {
        match self {
            ActionName::ToggleAuto => "f1",
            ActionName::ManualAction => "f2",
            ActionName::ShowTime => "f3",
            ActionName::SetWindow => "f4",
            ActionName::ExitApp => "ctrl+o",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Hotkey spec string per action. Collisions are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct HotkeyBindings {
    bindings: HashMap<ActionName, String>,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self {
            bindings: ActionName::ALL
                .into_iter()
                .map(|action| (action, action.default_hotkey().to_string()))
                .collect(),
        }
    }
}

impl HotkeyBindings {
    pub fn get(&self, action: ActionName) -> &str {
        self.bindings
            .get(&action)
            .map(String::as_str)
            .unwrap_or_else(|| action.default_hotkey())
    }

    pub fn set(&mut self, action: ActionName, spec: impl Into<String>) {
        self.bindings.insert(action, spec.into());
    }

    /// Bindings in the fixed action order
    pub fn iter(&self) -> impl Iterator<Item = (ActionName, &str)> + '_ {
        ActionName::ALL.into_iter().map(move |action| (action, self.get(action)))
    }
}

/// Everything persisted in the config file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub settings: Settings,
    pub hotkeys: HotkeyBindings,
}

/// Reads and writes [`Config`] at a fixed path
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$ANTIAFK_CONFIG`, or `options.ini` beside the executable
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(paths::CONFIG_ENV_VAR) {
            return PathBuf::from(path);
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(paths::CONFIG_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, creating the file with defaults if it is missing.
    ///
    /// Missing or invalid keys fall back to their defaults.
    pub fn load(&self) -> Result<Config, AntiAfkError> {
        if !self.path.exists() {
            info!("Config file {} not found, writing defaults", self.path.display());
            let config = Config::default();
            self.save(&config)?;
            return Ok(config);
        }

        let text = fs::read_to_string(&self.path)?;
        let sections = parse_ini(&text);
        let mut config = Config::default();

        if let Some(values) = sections.get(SETTINGS_SECTION) {
            for key in Settings::KEYS {
                match values.get(key) {
                    Some(raw) => {
                        if let Err(e) = config.settings.set(key, raw) {
                            warn!("Ignoring {} from config: {}", key, e);
                        }
                    }
                    None => debug!("Setting {} missing, using default", key),
                }
            }
        }

        if let Some(values) = sections.get(KEYBINDS_SECTION) {
            for action in ActionName::ALL {
                match values.get(action.key()).filter(|spec| !spec.is_empty()) {
                    Some(spec) if parse_hotkey(spec).is_some() => {
                        config.hotkeys.set(action, spec.clone());
                    }
                    Some(spec) => warn!("Ignoring hotkey '{}' for {}: unrecognised", spec, action),
                    None => debug!("Hotkey for {} missing, using default", action),
                }
            }
        }

        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<(), AntiAfkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, render_ini(config))?;
        debug!("Config saved to {}", self.path.display());
        Ok(())
    }
}

fn render_ini(config: &Config) -> String {
    let mut out = format!("[{}]\n", SETTINGS_SECTION);
    for key in Settings::KEYS {
        if let Some(value) = config.settings.get(key) {
            out.push_str(&format!("{} = {}\n", key, value));
        }
    }
    out.push_str(&format!("\n[{}]\n", KEYBINDS_SECTION));
    for (action, spec) in config.hotkeys.iter() {
        out.push_str(&format!("{} = {}\n", action.key(), spec));
    }
    out
}

/// Section name -> key -> raw value. Keys outside any section are dropped.
fn parse_ini(text: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) else {
            continue;
        };
        if let Some(section) = &current {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    sections
}
