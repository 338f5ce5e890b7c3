//! Multi-touch overlay routing pointers to control widgets

use crate::button::ButtonWidget;
use crate::dpad::{Direction, DpadWidget};
use crate::layout::{place, ContainerSize, ControlDescriptor, ControlKind, ControlLayout, PixelBounds};
use se_native::{ButtonCode, CoreControls};
use std::collections::HashMap;
use std::sync::Arc;

/// Pointer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One pointer sample in container coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub pointer: u64,
    pub phase: TouchPhase,
    pub x: f32,
    pub y: f32,
}

impl Touch {
    pub fn new(pointer: u64, phase: TouchPhase, x: f32, y: f32) -> Self {
        Self {
            pointer,
            phase,
            x,
            y,
        }
    }
}

/// Button state change produced by a widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonEvent {
    pub code: ButtonCode,
    pub pressed: bool,
}

impl ButtonEvent {
    pub fn press(code: ButtonCode) -> Self {
        Self {
            code,
            pressed: true,
        }
    }

    pub fn release(code: ButtonCode) -> Self {
        Self {
            code,
            pressed: false,
        }
    }
}

/// Runtime instance of a layout entry
#[derive(Debug, Clone)]
pub enum ControlWidget {
    Button(ButtonWidget),
    Dpad(DpadWidget),
}

impl ControlWidget {
    fn from_descriptor(control: &ControlDescriptor, container: ContainerSize) -> Self {
        let bounds = place(control, container);
        match control.kind {
            ControlKind::Button => {
                ControlWidget::Button(ButtonWidget::new(&control.id, control.button_code(), bounds))
            }
            ControlKind::Dpad => ControlWidget::Dpad(DpadWidget::new(&control.id, bounds)),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ControlWidget::Button(b) => b.id(),
            ControlWidget::Dpad(d) => d.id(),
        }
    }

    pub fn kind(&self) -> ControlKind {
        match self {
            ControlWidget::Button(_) => ControlKind::Button,
            ControlWidget::Dpad(_) => ControlKind::Dpad,
        }
    }

    pub fn bounds(&self) -> PixelBounds {
        match self {
            ControlWidget::Button(b) => b.bounds(),
            ControlWidget::Dpad(d) => d.bounds(),
        }
    }

    /// Pressed for buttons, any direction asserted for the dpad
    pub fn is_active(&self) -> bool {
        match self {
            ControlWidget::Button(b) => b.is_pressed(),
            ControlWidget::Dpad(d) => d.direction() != Direction::Neutral,
        }
    }

    fn set_bounds(&mut self, bounds: PixelBounds) {
        match self {
            ControlWidget::Button(b) => b.set_bounds(bounds),
            ControlWidget::Dpad(d) => d.set_bounds(bounds),
        }
    }

    fn hit(&self, x: f32, y: f32) -> bool {
        match self {
            ControlWidget::Button(b) => b.hit(x, y),
            ControlWidget::Dpad(d) => d.hit(x, y),
        }
    }

    /// A dpad follows a single pointer at a time
    fn accepts_pointer(&self) -> bool {
        match self {
            ControlWidget::Button(_) => true,
            ControlWidget::Dpad(d) => !d.is_tracking(),
        }
    }

    fn on_touch(&mut self, phase: TouchPhase, x: f32, y: f32, out: &mut Vec<ButtonEvent>) {
        match self {
            ControlWidget::Button(b) => b.on_touch(phase, out),
            ControlWidget::Dpad(d) => d.on_touch(phase, x, y, out),
        }
    }

    fn release(&mut self, out: &mut Vec<ButtonEvent>) {
        match self {
            ControlWidget::Button(b) => b.release(out),
            ControlWidget::Dpad(d) => d.release(out),
        }
    }
}

/// Touch overlay over the display surface
pub struct TouchOverlay {
    layout: ControlLayout,
    container: ContainerSize,
    widgets: Vec<ControlWidget>,
    /// Pointer id → index of the widget it went down on
    captures: HashMap<u64, usize>,
    sink: Arc<dyn CoreControls>,
    pending: Vec<ButtonEvent>,
}

impl TouchOverlay {
    /// Build widgets for every control, placed against a provisional
    /// container size. Call [`relayout`](Self::relayout) once the real size is
    /// known.
    pub fn new(layout: ControlLayout, sink: Arc<dyn CoreControls>, provisional: ContainerSize) -> Self {
        let widgets = layout
            .controls()
            .iter()
            .map(|c| ControlWidget::from_descriptor(c, provisional))
            .collect();

        tracing::debug!(
            "Touch overlay created with {} controls at {}x{}",
            layout.len(),
            provisional.width,
            provisional.height
        );

        Self {
            layout,
            container: provisional,
            widgets,
            captures: HashMap::new(),
            sink,
            pending: Vec::new(),
        }
    }

    pub fn container(&self) -> ContainerSize {
        self.container
    }

    pub fn widgets(&self) -> &[ControlWidget] {
        &self.widgets
    }

    /// Recompute all pixel bounds from the layout for a new container size
    pub fn relayout(&mut self, container: ContainerSize) {
        if container == self.container {
            return;
        }

        for (widget, control) in self.widgets.iter_mut().zip(self.layout.controls()) {
            widget.set_bounds(place(control, container));
        }
        tracing::debug!(
            "Overlay relaid out for {}x{}",
            container.width,
            container.height
        );
        self.container = container;
    }

    /// Topmost widget under the point; later controls draw above earlier ones
    pub fn hit_test(&self, x: f32, y: f32) -> Option<usize> {
        self.widgets.iter().rposition(|w| w.hit(x, y))
    }

    /// Route one pointer sample. Returns the number of button events sent.
    pub fn handle_touch(&mut self, touch: Touch) -> usize {
        match touch.phase {
            TouchPhase::Down => {
                // a repeated Down for a live pointer means its Up got lost
                if let Some(stale) = self.captures.remove(&touch.pointer) {
                    self.widgets[stale].on_touch(TouchPhase::Cancel, touch.x, touch.y, &mut self.pending);
                }
                if let Some(index) = self.hit_test(touch.x, touch.y) {
                    if self.widgets[index].accepts_pointer() {
                        self.captures.insert(touch.pointer, index);
                        self.widgets[index].on_touch(TouchPhase::Down, touch.x, touch.y, &mut self.pending);
                    }
                }
            }
            TouchPhase::Move => {
                if let Some(&index) = self.captures.get(&touch.pointer) {
                    self.widgets[index].on_touch(TouchPhase::Move, touch.x, touch.y, &mut self.pending);
                }
            }
            TouchPhase::Up | TouchPhase::Cancel => {
                if let Some(index) = self.captures.remove(&touch.pointer) {
                    self.widgets[index].on_touch(touch.phase, touch.x, touch.y, &mut self.pending);
                }
            }
        }
        self.flush()
    }

    /// Release every control and forget all pointers
    pub fn release_all(&mut self) -> usize {
        self.captures.clear();
        for widget in &mut self.widgets {
            widget.release(&mut self.pending);
        }
        self.flush()
    }

    fn flush(&mut self) -> usize {
        let mut sent = 0;
        for event in self.pending.drain(..) {
            if event.code == ButtonCode::NONE {
                continue;
            }
            self.sink.set_button_state(event.code, event.pressed);
            sent += 1;
        }
        sent
    }
}

impl Drop for TouchOverlay {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use se_native::{CallLog, CoreCall, CoreInterface, NullCore};

    fn overlay() -> (TouchOverlay, CallLog) {
        let core = NullCore::new();
        let log = core.log();
        let overlay = TouchOverlay::new(
            ControlLayout::builtin().unwrap(),
            core.controls(),
            ContainerSize::new(1000.0, 500.0),
        );
        (overlay, log)
    }

    fn center_of(overlay: &TouchOverlay, id: &str) -> (f32, f32) {
        overlay
            .widgets()
            .iter()
            .find(|w| w.id() == id)
            .map(|w| w.bounds().center())
            .unwrap()
    }

    #[test]
    fn test_tap_button() {
        let (mut overlay, log) = overlay();
        let (x, y) = center_of(&overlay, "btnA");

        overlay.handle_touch(Touch::new(0, TouchPhase::Down, x, y));
        overlay.handle_touch(Touch::new(0, TouchPhase::Up, x, y));

        assert_eq!(
            log.calls(),
            vec![
                CoreCall::SetButtonState(ButtonCode::A, true),
                CoreCall::SetButtonState(ButtonCode::A, false),
            ]
        );
    }

    #[test]
    fn test_pointer_stays_captured() {
        let (mut overlay, log) = overlay();
        let (x, y) = center_of(&overlay, "btnB");

        overlay.handle_touch(Touch::new(3, TouchPhase::Down, x, y));
        // sliding off the button does not release it
        overlay.handle_touch(Touch::new(3, TouchPhase::Move, 1.0, 1.0));
        assert!(overlay.widgets().iter().any(|w| w.id() == "btnB" && w.is_active()));
        overlay.handle_touch(Touch::new(3, TouchPhase::Cancel, 1.0, 1.0));

        assert_eq!(log.calls().last(), Some(&CoreCall::SetButtonState(ButtonCode::B, false)));
    }

    #[test]
    fn test_multi_touch_dpad_and_button() {
        let (mut overlay, log) = overlay();
        let dpad = overlay.widgets()[0].bounds();
        let (ax, ay) = center_of(&overlay, "btnA");
        let right_x = (dpad.left + dpad.side - 2) as f32;
        let (_, cy) = dpad.center();

        overlay.handle_touch(Touch::new(0, TouchPhase::Down, right_x, cy));
        overlay.handle_touch(Touch::new(1, TouchPhase::Down, ax, ay));
        overlay.handle_touch(Touch::new(0, TouchPhase::Up, right_x, cy));

        let calls = log.calls();
        assert!(calls.contains(&CoreCall::SetButtonState(ButtonCode::RIGHT, true)));
        assert!(calls.contains(&CoreCall::SetButtonState(ButtonCode::A, true)));
        assert!(!calls.contains(&CoreCall::SetButtonState(ButtonCode::A, false)));
        assert_eq!(calls.last(), Some(&CoreCall::SetButtonState(ButtonCode::RIGHT, false)));
    }

    #[test]
    fn test_miss_sends_nothing() {
        let (mut overlay, log) = overlay();
        assert_eq!(overlay.handle_touch(Touch::new(0, TouchPhase::Down, 500.0, 10.0)), 0);
        assert_eq!(overlay.handle_touch(Touch::new(0, TouchPhase::Up, 500.0, 10.0)), 0);
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_relayout_recomputes_from_layout() {
        let (mut overlay, _log) = overlay();
        let before: Vec<_> = overlay.widgets().iter().map(|w| w.bounds()).collect();

        overlay.relayout(ContainerSize::new(333.0, 777.0));
        overlay.relayout(ContainerSize::new(1000.0, 500.0));
        let after: Vec<_> = overlay.widgets().iter().map(|w| w.bounds()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_release_all_on_drop() {
        let (mut overlay, log) = overlay();
        let (x, y) = center_of(&overlay, "btnStart");
        overlay.handle_touch(Touch::new(0, TouchPhase::Down, x, y));

        drop(overlay);
        assert_eq!(
            log.calls().last(),
            Some(&CoreCall::SetButtonState(ButtonCode::START, false))
        );
    }

    #[test]
    fn test_unmapped_button_is_not_sent() {
        let layout = ControlLayout::from_json(
            r#"{"buttons":[{"id":"btnTurbo","type":"button","x":0,"y":0,"size":0.5}]}"#,
        )
        .unwrap();
        let core = NullCore::new();
        let log = core.log();
        let mut overlay = TouchOverlay::new(layout, core.controls(), ContainerSize::new(100.0, 100.0));

        overlay.handle_touch(Touch::new(0, TouchPhase::Down, 25.0, 25.0));
        assert!(overlay.widgets()[0].is_active());
        overlay.handle_touch(Touch::new(0, TouchPhase::Up, 25.0, 25.0));
        assert!(log.calls().is_empty());
    }
}
