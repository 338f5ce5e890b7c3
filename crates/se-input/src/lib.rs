//! Virtual input overlay for saasemu
//!
//! A [`ControlLayout`] describes the controls in normalized coordinates; a
//! [`TouchOverlay`] places them in pixels, routes pointer samples to the
//! widget each pointer went down on, and forwards button state changes to the
//! core's [`CoreControls`](se_native::CoreControls).

pub mod button;
pub mod dpad;
pub mod layout;
pub mod overlay;

pub use button::{fill_alpha, ButtonWidget};
pub use dpad::{Direction, DpadWidget};
pub use layout::{place, ContainerSize, ControlDescriptor, ControlKind, ControlLayout, PixelBounds};
pub use overlay::{ButtonEvent, ControlWidget, Touch, TouchOverlay, TouchPhase};
