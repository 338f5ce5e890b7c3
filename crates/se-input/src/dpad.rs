//! Four-way directional pad widget
//!
//! Touch position relative to the widget center is bucketed into one of four
//! 90° sectors around the cardinal directions, with a dead zone of a quarter
//! of the widget width. Output is edge-triggered: nothing is sent while the
//! bucket stays the same, and a bucket change releases all four directions
//! before pressing the new one.

use crate::layout::PixelBounds;
use crate::overlay::{ButtonEvent, TouchPhase};
use se_native::ButtonCode;

/// Dead-zone radius as a fraction of widget width
pub const DEAD_ZONE: f64 = 0.25;

/// Fill colour (RGBA) of the dpad
pub const DPAD_RGBA: [u8; 4] = [80, 80, 200, 120];

/// Asserted direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Neutral,
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn code(self) -> Option<ButtonCode> {
        match self {
            Direction::Neutral => None,
            Direction::Up => Some(ButtonCode::UP),
            Direction::Down => Some(ButtonCode::DOWN),
            Direction::Left => Some(ButtonCode::LEFT),
            Direction::Right => Some(ButtonCode::RIGHT),
        }
    }

    /// Bucket an offset from the widget center (screen axes, y down).
    ///
    /// Sector edges belong to the sector counter-clockwise of them on screen:
    /// right `[-45°, 45°)`, down `[45°, 135°)`, left `[135°, 180°] ∪ (-180°, -135°)`,
    /// up `[-135°, -45°)`.
    pub fn classify(dx: f64, dy: f64, width: f64) -> Self {
        if dx.hypot(dy) < DEAD_ZONE * width {
            Direction::Neutral
        } else if dx > 0.0 && dy >= -dx && dy < dx {
            Direction::Right
        } else if dy > 0.0 && dx <= dy && dx > -dy {
            Direction::Down
        } else if dx < 0.0 && dy <= -dx && dy > dx {
            Direction::Left
        } else {
            Direction::Up
        }
    }
}

#[derive(Debug, Clone)]
pub struct DpadWidget {
    id: String,
    bounds: PixelBounds,
    direction: Direction,
    tracking: bool,
}

impl DpadWidget {
    pub fn new(id: impl Into<String>, bounds: PixelBounds) -> Self {
        Self {
            id: id.into(),
            bounds,
            direction: Direction::Neutral,
            tracking: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether a pointer currently steers this dpad
    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub(crate) fn set_bounds(&mut self, bounds: PixelBounds) {
        self.bounds = bounds;
    }

    pub fn hit(&self, x: f32, y: f32) -> bool {
        self.bounds.contains(x, y)
    }

    /// Feed one pointer sample in container coordinates
    pub fn on_touch(&mut self, phase: TouchPhase, x: f32, y: f32, out: &mut Vec<ButtonEvent>) {
        match phase {
            TouchPhase::Down => {
                self.tracking = true;
                self.steer_to(x, y, out);
            }
            TouchPhase::Move => {
                if self.tracking {
                    self.steer_to(x, y, out);
                }
            }
            TouchPhase::Up | TouchPhase::Cancel => self.release(out),
        }
    }

    /// Stop tracking and clear any asserted direction
    pub fn release(&mut self, out: &mut Vec<ButtonEvent>) {
        self.tracking = false;
        self.set_direction(Direction::Neutral, out);
    }

    fn steer_to(&mut self, x: f32, y: f32, out: &mut Vec<ButtonEvent>) {
        let (cx, cy) = self.bounds.center();
        let next = Direction::classify(
            f64::from(x - cx),
            f64::from(y - cy),
            f64::from(self.bounds.side),
        );
        self.set_direction(next, out);
    }

    fn set_direction(&mut self, next: Direction, out: &mut Vec<ButtonEvent>) {
        if next == self.direction {
            return;
        }

        // clear-then-set keeps at most one direction asserted
        out.extend(ButtonCode::DIRECTIONS.iter().map(|&code| ButtonEvent::release(code)));
        if let Some(code) = next.code() {
            out.push(ButtonEvent::press(code));
        }
        tracing::trace!("{} {:?} -> {:?}", self.id, self.direction, next);
        self.direction = next;
    }
}
