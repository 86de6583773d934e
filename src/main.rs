//! antiafk - Anti-idle automation for background game windows
//!
//! Periodically focuses the target window, pans the camera with a virtual
//! gamepad stick, taps A, and gives focus back to whatever you were using.

use antiafk::{
    console, logging, ActionEngine, AntiAfkError, App, Config, InputSink, RdevHotkeyService,
    Scheduler, SettingsStore, Shutdown, TracingObserver, UinputGamepad, WindowSystem,
    X11WindowSystem,
};
use antiafk::constants::permissions;
use antiafk::hotkey::format_hotkey;
use antiafk::ActionName;
use std::sync::Arc;
use tracing::{error, info, warn};

fn create_gamepad() -> Option<Box<dyn InputSink>> {
    match UinputGamepad::new() {
        Ok(gamepad) => Some(Box::new(gamepad) as Box<dyn InputSink>),
        Err(AntiAfkError::PermissionDenied) => {
            error!("Permission denied opening /dev/uinput. Add your user to the '{}' group:", permissions::INPUT_GROUP);
            error!("  {}", permissions::ADD_TO_INPUT_GROUP);
            error!("Then logout and login again.");
            warn!("Continuing without a virtual gamepad: actions will not send input");
            None
        }
        Err(e) => {
            error!("Could not initialize virtual gamepad: {}", e);
            warn!("Continuing without a virtual gamepad: actions will not send input");
            None
        }
    }
}

fn main() -> Result<(), AntiAfkError> {
    logging::init(logging::verbose_from_env());

    info!("antiafk starting...");

    // Load configuration
    let store = SettingsStore::new(SettingsStore::default_path());
    let config = store.load().unwrap_or_else(|e| {
        warn!("Could not load {}: {}. Using defaults", store.path().display(), e);
        Config::default()
    });
    info!(
        "Config: interval={}s, speed={}, duration={}s, radius={}, loops={}",
        config.settings.interval,
        config.settings.speed_multiplier,
        config.settings.action_duration,
        config.settings.circle_radius,
        config.settings.circle_loops
    );

    // Set up Ctrl+C handler for graceful shutdown
    let shutdown = Arc::new(Shutdown::new());
    let on_signal = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        on_signal.trigger();
    }) {
        warn!("Failed to set Ctrl+C handler: {}", e);
    }

    let system: Arc<dyn WindowSystem> = Arc::new(X11WindowSystem::new()?);
    let engine = Arc::new(ActionEngine::new(
        config.settings.clone(),
        system,
        create_gamepad(),
    )
    .with_shutdown(Arc::clone(&shutdown)));
    engine.subscribe(Arc::new(TracingObserver));

    let hotkeys = RdevHotkeyService::new();
    let _listener_handle = hotkeys.start_listener();

    let app = App::new(
        Arc::clone(&engine),
        Arc::new(hotkeys),
        store,
        config.hotkeys.clone(),
        Arc::clone(&shutdown),
    );
    app.register_hotkeys();

    let scheduler = Scheduler::spawn(engine, Arc::clone(&shutdown));
    let _console_handle = console::spawn(Arc::clone(&app));

    let bindings = app.bindings();
    info!(
        "Ready. Focus your game and press '{}' to set it as target, '{}' to start auto action",
        format_hotkey(bindings.get(ActionName::SetWindow)),
        format_hotkey(bindings.get(ActionName::ToggleAuto))
    );
    info!("Type 'help' for console commands. Press Ctrl+C or '{}' to exit", format_hotkey(bindings.get(ActionName::ExitApp)));

    shutdown.wait();

    info!("antiafk shutting down...");
    scheduler.join();

    // Listener and console threads end with the process
    Ok(())
}
