//! Line-based terminal control surface

use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

use crate::app::{App, Rebind};
use crate::config::{ActionName, Settings};
use crate::hotkey::format_hotkey;

pub const HELP: &str = "\
Commands:
  toggle              start/stop auto action
  fire                run the action once
  target              use the focused window as target (the set_window hotkey is easier from inside the game)
  test                check the target window still exists
  time                show time until the next action
  status              show target, settings and hotkeys
  set <key> <value>   change a setting (interval, speed_multiplier, action_duration, circle_radius, circle_loops)
  rebind <action>     press a new hotkey for an action (toggle_auto, manual_action, show_time, set_window, exit_app)
  cancel              cancel a pending rebind
  help                show this text
  quit                exit";

/// A parsed console command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Toggle,
    Fire,
    Target,
    Test,
    Time,
    Status,
    Set { key: String, value: String },
    Rebind(ActionName),
    Cancel,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let rest: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("toggle", []) => Command::Toggle,
        ("fire", []) => Command::Fire,
        ("target", []) => Command::Target,
        ("test", []) => Command::Test,
        ("time", []) => Command::Time,
        ("status", []) => Command::Status,
        ("set", [key, value]) => Command::Set {
            key: key.to_string(),
            value: value.to_string(),
        },
        ("rebind", [action]) => Command::Rebind(
            ActionName::from_key(action).ok_or_else(|| format!("unknown action '{}'", action))?,
        ),
        ("cancel", []) => Command::Cancel,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => return Err(format!("unrecognised command '{}'", line.trim())),
    };
    Ok(command)
}

/// Console state: the pending rebind, if any
#[derive(Default)]
pub struct Console {
    rebind: Option<Rebind>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(&mut self, app: &Arc<App>, command: Command) {
        let engine = app.engine();
        match command {
            Command::Toggle => app.dispatch(ActionName::ToggleAuto),
            Command::Fire => app.dispatch(ActionName::ManualAction),
            Command::Target => app.dispatch(ActionName::SetWindow),
            Command::Test => {
                engine.test_target();
            }
            Command::Time => app.dispatch(ActionName::ShowTime),
            Command::Status => status_lines(app).iter().for_each(|line| print_line(line)),
            Command::Set { key, value } => {
                // Rejections are already reported as status
                let _ = app.update_setting(&key, &value);
            }
            Command::Rebind(action) => {
                self.rebind = self.rebind.take().filter(|_| app.is_rebinding());
                match app.rebind(action) {
                    Ok(rebind) => self.rebind = Some(rebind),
                    Err(e) => warn!("{}", e),
                }
            }
            Command::Cancel => match self.rebind.take() {
                Some(rebind) => {
                    rebind.cancel();
                    rebind.wait();
                }
                None => info!("No rebind in progress"),
            },
            Command::Help => HELP.lines().for_each(print_line),
            Command::Quit => app.request_exit(),
        }
    }
}

/// All console output goes through here
fn print_line(line: &str) {
    println!("{}", line);
}

/// Target, countdown, settings and bindings, one line each
pub fn status_lines(app: &App) -> Vec<String> {
    let engine = app.engine();
    let mut lines = Vec::new();
    lines.push(match engine.target() {
        Some(target) => format!("Target: {}", target),
        None => format!(
            "No window set. Press '{}' on a window.",
            format_hotkey(app.bindings().get(ActionName::SetWindow))
        ),
    });
    lines.push(match engine.time_remaining() {
        Some(left) => format!("Next action in: {}s", left.as_secs()),
        None => "Auto action is OFF".to_string(),
    });
    if !engine.has_gamepad() {
        lines.push("Virtual gamepad unavailable: actions will not send input".to_string());
    }
    let settings = engine.settings();
    for key in Settings::KEYS {
        lines.push(format!("  {} = {}", key, settings.get(key).unwrap_or_default()));
    }
    for (action, spec) in app.bindings().iter() {
        lines.push(format!("  {} -> {}", action, format_hotkey(spec)));
    }
    lines
}

/// Read commands from stdin on a background thread until EOF or `quit`
pub fn spawn(app: Arc<App>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut console = Console::new();
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Ok(Command::Quit) => {
                    console.execute(&app, Command::Quit);
                    break;
                }
                Ok(command) => console.execute(&app, command),
                Err(e) => print_line(&format!("{} (type 'help')", e)),
            }
        }
    })
}
