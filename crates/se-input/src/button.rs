//! Circular button widget bound to one button code

use crate::layout::PixelBounds;
use crate::overlay::{ButtonEvent, TouchPhase};
use se_native::ButtonCode;

/// Fill colour (RGB) of a button
pub const BUTTON_RGB: [u8; 3] = [200, 50, 50];
/// Fill colour (RGB) of a pressed button
pub const BUTTON_PRESSED_RGB: [u8; 3] = [255, 80, 80];

/// Fill alpha for the given pressed state
pub fn fill_alpha(pressed: bool) -> u8 {
    if pressed {
        180
    } else {
        120
    }
}

/// A circular touch target. Pressed while at least one pointer holds it.
#[derive(Debug, Clone)]
pub struct ButtonWidget {
    id: String,
    code: ButtonCode,
    bounds: PixelBounds,
    holders: u32,
}

impl ButtonWidget {
    pub fn new(id: impl Into<String>, code: ButtonCode, bounds: PixelBounds) -> Self {
        let id = id.into();
        if code == ButtonCode::NONE {
            tracing::warn!("Control {:?} has no button mapping", id);
        }
        Self {
            id,
            code,
            bounds,
            holders: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn code(&self) -> ButtonCode {
        self.code
    }

    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    pub fn is_pressed(&self) -> bool {
        self.holders > 0
    }

    pub(crate) fn set_bounds(&mut self, bounds: PixelBounds) {
        self.bounds = bounds;
    }

    pub fn hit(&self, x: f32, y: f32) -> bool {
        self.bounds.contains_circle(x, y)
    }

    /// Feed one pointer phase; pushes a state change when the pressed state flips
    pub fn on_touch(&mut self, phase: TouchPhase, out: &mut Vec<ButtonEvent>) {
        match phase {
            TouchPhase::Down => {
                self.holders += 1;
                if self.holders == 1 {
                    out.push(ButtonEvent::press(self.code));
                }
            }
            TouchPhase::Move => {}
            TouchPhase::Up | TouchPhase::Cancel => {
                if self.holders > 0 {
                    self.holders -= 1;
                    if self.holders == 0 {
                        out.push(ButtonEvent::release(self.code));
                    }
                }
            }
        }
    }

    /// Drop every holder and release if pressed
    pub fn release(&mut self, out: &mut Vec<ButtonEvent>) {
        if self.holders > 0 {
            self.holders = 0;
            out.push(ButtonEvent::release(self.code));
        }
    }
}
