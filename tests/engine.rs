mod common;

use antiafk::{ActionEngine, ActionOutcome, InputSink, Settings, WindowHandle};
use common::{expected_sequence, fast_settings, FakeWindowSystem, RecordingSink, StatusLog};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    engine: Arc<ActionEngine>,
    desktop: Arc<FakeWindowSystem>,
    sink: RecordingSink,
    status: Arc<StatusLog>,
    game: WindowHandle,
    editor: WindowHandle,
}

fn harness_with(settings: Settings, sink: RecordingSink) -> Harness {
    let desktop = FakeWindowSystem::new();
    let game = desktop.open(1, "Game", Some("game.exe"));
    let editor = desktop.open(2, "Editor", Some("editor"));
    desktop.focus(editor);
    desktop.move_cursor((640, 360));

    let engine = Arc::new(ActionEngine::new(
        settings,
        desktop.clone(),
        Some(Box::new(sink.clone()) as Box<dyn InputSink>),
    ));
    let status = Arc::new(StatusLog::default());
    engine.subscribe(status.clone());

    Harness {
        engine,
        desktop,
        sink,
        status,
        game,
        editor,
    }
}

fn harness() -> Harness {
    harness_with(fast_settings(), RecordingSink::new())
}

/// Target the game window, then hand focus back to the editor
fn target_game(h: &Harness) {
    h.desktop.focus(h.game);
    assert!(h.engine.set_target());
    h.desktop.focus(h.editor);
}

#[test]
fn enabling_auto_schedules_one_interval_out() {
    let mut settings = fast_settings();
    settings.interval = 30;
    let h = harness_with(settings, RecordingSink::new());

    assert_eq!(h.engine.time_remaining(), None);
    assert!(h.engine.toggle_auto());

    let left = h.engine.time_remaining().unwrap();
    assert!(left <= Duration::from_secs(30));
    assert!(left >= Duration::from_secs(30) - Duration::from_millis(100));
    assert_eq!(h.status.last().as_deref(), Some("Auto Action: ON"));

    assert!(!h.engine.toggle_auto());
    assert_eq!(h.engine.time_remaining(), None);
    assert_eq!(*h.status.icon_states.lock().unwrap(), vec![true, false]);
}

#[test]
fn show_time_reports_countdown_or_off() {
    let h = harness();
    h.engine.show_time();
    assert_eq!(h.status.last().as_deref(), Some("Auto action is OFF"));

    h.engine.update_setting("interval", "90").unwrap();
    h.engine.toggle_auto();
    h.engine.show_time();
    let last = h.status.last().unwrap();
    assert!(last == "Next action in: 89s" || last == "Next action in: 90s", "{}", last);
}

#[test]
fn set_target_captures_title_and_process() {
    let h = harness();
    target_game(&h);

    let target = h.engine.target().unwrap();
    assert_eq!(target.handle, h.game);
    assert_eq!(target.to_string(), "Game - game.exe");
    assert!(h.engine.test_target());
    assert_eq!(h.status.last().as_deref(), Some("Success! Target is 'Game'"));
}

#[test]
fn set_target_fails_when_process_cannot_be_queried() {
    let h = harness();
    let orphan = h.desktop.open(3, "Orphan", None);
    target_game(&h);

    h.desktop.focus(orphan);
    assert!(!h.engine.set_target());
    assert_eq!(h.engine.target(), None);
}

#[test]
fn test_target_clears_a_destroyed_window() {
    let h = harness();
    target_game(&h);
    h.desktop.close(h.game);

    assert!(!h.engine.test_target());
    assert_eq!(h.engine.target(), None);
    assert_eq!(
        h.status.last().as_deref(),
        Some("Failure: Target window not set or has been closed.")
    );
}

#[test]
fn manual_fire_while_disabled_runs_the_sequence_once() {
    let h = harness();
    target_game(&h);

    let outcome = h.engine.manual_fire().join().unwrap();

    assert_eq!(outcome, ActionOutcome::Completed);
    assert_eq!(h.sink.events(), expected_sequence(1, 0.8));
    assert!(!h.engine.is_enabled());
    assert_eq!(h.engine.time_remaining(), None);
    assert_eq!(h.status.last().as_deref(), Some("Actions sent to: Game"));
}

#[test]
fn manual_fire_leaves_the_deadline_alone() {
    let mut settings = fast_settings();
    settings.interval = 60;
    let h = harness_with(settings, RecordingSink::new());
    target_game(&h);
    h.engine.toggle_auto();
    let before = h.engine.time_remaining().unwrap();

    h.engine.manual_fire().join().unwrap();

    let after = h.engine.time_remaining().unwrap();
    let elapsed = before - after;
    // only wall-clock time passed, the deadline itself did not move
    assert!(elapsed < Duration::from_secs(2));
}

#[test]
fn sequence_restores_focus_and_cursor() {
    let h = harness();
    target_game(&h);
    h.desktop.minimize(h.game);

    assert_eq!(h.engine.fire_action(), ActionOutcome::Completed);

    assert_eq!(h.desktop.activations(), vec![h.game, h.editor]);
    assert_eq!(h.desktop.current_foreground(), Some(h.editor));
    assert_eq!(h.desktop.cursor(), (640, 360));
}

#[test]
fn missing_target_aborts_without_input() {
    let h = harness();

    assert_eq!(h.engine.fire_action(), ActionOutcome::TargetUnavailable);
    assert!(h.sink.events().is_empty());
    assert_eq!(h.status.last().as_deref(), Some("Target window not set"));
}

#[test]
fn closed_target_is_cleared_on_fire() {
    let h = harness();
    target_game(&h);
    h.desktop.close(h.game);

    assert_eq!(h.engine.fire_action(), ActionOutcome::TargetUnavailable);
    assert_eq!(h.engine.target(), None);
    assert_eq!(h.status.last().as_deref(), Some("Target window no longer exists."));
}

#[test]
fn refused_focus_aborts_and_still_restores() {
    let h = harness();
    target_game(&h);
    h.desktop.refuse_focus(true);

    assert_eq!(h.engine.fire_action(), ActionOutcome::ActivationFailed);
    assert!(h.sink.events().is_empty());
    assert!(h
        .status
        .messages()
        .contains(&"Failed to bring target window to foreground".to_string()));
    assert_eq!(h.desktop.cursor(), (640, 360));
    // target is kept: activation failures are transient
    assert!(h.engine.target().is_some());
}

#[test]
fn input_error_is_reported_and_focus_restored() {
    let sink = RecordingSink {
        fail_at: Some(20),
        ..RecordingSink::new()
    };
    let h = harness_with(fast_settings(), sink);
    target_game(&h);

    match h.engine.fire_action() {
        ActionOutcome::InputFailed(reason) => assert!(reason.contains("injected failure")),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(h.desktop.current_foreground(), Some(h.editor));
    assert!(h.status.last().unwrap().starts_with("Error during actions"));
}

#[test]
fn panicking_sink_does_not_escape_the_sequence() {
    let sink = RecordingSink {
        panic_on_press: true,
        ..RecordingSink::new()
    };
    let h = harness_with(fast_settings(), sink);
    target_game(&h);

    assert!(matches!(h.engine.fire_action(), ActionOutcome::InputFailed(_)));
    assert_eq!(h.desktop.current_foreground(), Some(h.editor));
    assert_eq!(h.desktop.cursor(), (640, 360));

    // the engine stays usable afterwards
    assert!(matches!(h.engine.fire_action(), ActionOutcome::InputFailed(_)));
}

#[test]
fn no_gamepad_still_completes_without_input() {
    let desktop = FakeWindowSystem::new();
    let game = desktop.open(1, "Game", Some("game.exe"));
    desktop.focus(game);
    let engine = ActionEngine::new(fast_settings(), desktop.clone(), None);
    assert!(engine.set_target());

    assert!(!engine.has_gamepad());
    assert_eq!(engine.fire_action(), ActionOutcome::Completed);
}

#[test]
fn concurrent_fires_never_interleave() {
    let h = harness();
    target_game(&h);

    let manual = h.engine.manual_fire();
    let scheduled = {
        let engine = Arc::clone(&h.engine);
        std::thread::spawn(move || engine.fire_action())
    };
    assert_eq!(manual.join().unwrap(), ActionOutcome::Completed);
    assert_eq!(scheduled.join().unwrap(), ActionOutcome::Completed);

    let one = expected_sequence(1, 0.8);
    let events = h.sink.events();
    assert_eq!(events.len(), one.len() * 2);
    assert_eq!(events[..one.len()], one[..]);
    assert_eq!(events[one.len()..], one[..]);
}

#[test]
fn rejected_setting_keeps_the_old_value() {
    let h = harness();

    assert!(h.engine.update_setting("circle_radius", "1.2").is_err());
    assert_eq!(h.engine.settings().circle_radius, 0.8);

    h.engine.update_setting("circle_radius", "0.5").unwrap();
    assert_eq!(h.engine.settings().circle_radius, 0.5);
    assert_eq!(h.status.last().as_deref(), Some("Circle radius set to 0.5"));
}
