//! Overlay behaviour as seen from the core's side channel

use se_input::{ContainerSize, ControlLayout, Touch, TouchOverlay, TouchPhase};
use se_native::{ButtonCode, CallLog, CoreCall, CoreInterface, NullCore};
use std::collections::HashSet;

fn overlay_at(width: f32, height: f32) -> (TouchOverlay, CallLog) {
    let core = NullCore::new();
    let log = core.log();
    let overlay = TouchOverlay::new(
        ControlLayout::builtin().unwrap(),
        core.controls(),
        ContainerSize::new(width, height),
    );
    (overlay, log)
}

/// Replay the log and return the codes held at the end
fn held(log: &CallLog) -> HashSet<ButtonCode> {
    let mut held = HashSet::new();
    for call in log.calls() {
        if let CoreCall::SetButtonState(code, pressed) = call {
            if pressed {
                held.insert(code);
            } else {
                held.remove(&code);
            }
        }
    }
    held
}

#[test]
fn test_deferred_placement() {
    // first pass before the container has been measured
    let (mut overlay, log) = overlay_at(0.0, 0.0);
    assert!(overlay.widgets().iter().all(|w| w.bounds().side == 0));

    overlay.relayout(ContainerSize::new(1280.0, 720.0));
    let (x, y) = overlay.widgets()[1].bounds().center();
    overlay.handle_touch(Touch::new(0, TouchPhase::Down, x, y));
    assert_eq!(held(&log), HashSet::from([ButtonCode::A]));
}

#[test]
fn test_dpad_drag_across_sectors() {
    let (mut overlay, log) = overlay_at(1280.0, 720.0);
    let dpad = overlay.widgets()[0].bounds();
    let (cx, cy) = dpad.center();
    let r = dpad.side as f32 * 0.45;

    overlay.handle_touch(Touch::new(0, TouchPhase::Down, cx, cy - r));
    assert_eq!(held(&log), HashSet::from([ButtonCode::UP]));

    // jump straight to the opposite sector without passing the dead zone
    overlay.handle_touch(Touch::new(0, TouchPhase::Move, cx, cy + r));
    assert_eq!(held(&log), HashSet::from([ButtonCode::DOWN]));

    overlay.handle_touch(Touch::new(0, TouchPhase::Move, cx - r, cy));
    assert_eq!(held(&log), HashSet::from([ButtonCode::LEFT]));

    overlay.handle_touch(Touch::new(0, TouchPhase::Move, cx + 1.0, cy));
    assert!(held(&log).is_empty());

    overlay.handle_touch(Touch::new(0, TouchPhase::Move, cx + r, cy));
    overlay.handle_touch(Touch::new(0, TouchPhase::Up, cx + r, cy));
    assert!(held(&log).is_empty());
}

#[test]
fn test_second_pointer_cannot_steal_dpad() {
    let (mut overlay, log) = overlay_at(1280.0, 720.0);
    let dpad = overlay.widgets()[0].bounds();
    let (cx, cy) = dpad.center();
    let r = dpad.side as f32 * 0.45;

    overlay.handle_touch(Touch::new(0, TouchPhase::Down, cx + r, cy));
    overlay.handle_touch(Touch::new(1, TouchPhase::Down, cx - r, cy));
    overlay.handle_touch(Touch::new(1, TouchPhase::Up, cx - r, cy));
    assert_eq!(held(&log), HashSet::from([ButtonCode::RIGHT]));
}

#[test]
fn test_lost_up_is_recovered() {
    let (mut overlay, log) = overlay_at(1280.0, 720.0);
    let (ax, ay) = overlay.widgets()[1].bounds().center();
    let (bx, by) = overlay.widgets()[2].bounds().center();

    overlay.handle_touch(Touch::new(4, TouchPhase::Down, ax, ay));
    // the same pointer id goes down again elsewhere
    overlay.handle_touch(Touch::new(4, TouchPhase::Down, bx, by));
    assert_eq!(held(&log), HashSet::from([ButtonCode::B]));
}

#[test]
fn test_release_all_clears_everything() {
    let (mut overlay, log) = overlay_at(1280.0, 720.0);
    for (pointer, widget) in overlay.widgets().to_vec().iter().enumerate() {
        let (x, y) = widget.bounds().center();
        overlay.handle_touch(Touch::new(pointer as u64, TouchPhase::Down, x, y + 1.0));
    }
    assert!(!held(&log).is_empty());

    overlay.release_all();
    assert!(held(&log).is_empty());
    assert!(overlay.widgets().iter().all(|w| !w.is_active()));
}
