//! The call contract of an emulation core module
//!
//! A full session drives the core in this order:
//! `init` (once per process) → `set_system_dir` → `load_core` → `attach_surface`
//! → `load_game` → `start_emulation` → … → `stop_emulation` → `detach_surface`
//! → `unload_core`.

use std::path::Path;
use std::sync::Arc;

/// Opaque identifier of a display surface owned by the hosting environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u64);

impl std::fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Host-defined button code. The core decodes these positionally, so the
/// values are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ButtonCode(pub u8);

impl ButtonCode {
    pub const NONE: Self = Self(0);
    pub const A: Self = Self(1);
    pub const B: Self = Self(2);
    pub const START: Self = Self(3);
    pub const UP: Self = Self(10);
    pub const DOWN: Self = Self(11);
    pub const LEFT: Self = Self(12);
    pub const RIGHT: Self = Self(13);

    /// The four directional codes, in up/down/left/right order
    pub const DIRECTIONS: [Self; 4] = [Self::UP, Self::DOWN, Self::LEFT, Self::RIGHT];

    /// Map a layout control id to its button code
    pub fn from_control_id(id: &str) -> Self {
        match id {
            "btnA" => Self::A,
            "btnB" => Self::B,
            "btnStart" => Self::START,
            _ => Self::NONE,
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle half of the core contract.
///
/// Boolean results report success synchronously; callers must not advance
/// their own state on `false`.
pub trait CoreInterface: Send {
    /// One-time process initialization
    fn init(&mut self, data_dir: &Path) -> bool;

    /// Directory the core searches for firmware/BIOS images
    fn set_system_dir(&mut self, dir: &Path);

    fn load_core(&mut self, path: &Path) -> bool;

    fn attach_surface(&mut self, surface: SurfaceHandle) -> bool;

    fn load_game(&mut self, path: &Path) -> bool;

    fn start_emulation(&mut self) -> bool;

    fn stop_emulation(&mut self);

    fn detach_surface(&mut self);

    fn unload_core(&mut self);

    /// Side channel for input and speed controls
    fn controls(&self) -> Arc<dyn CoreControls>;
}

/// Fire-and-forget controls, valid any time after a core is loaded.
/// Implementations must not block the caller.
pub trait CoreControls: Send + Sync {
    fn set_button_state(&self, code: ButtonCode, pressed: bool);

    fn set_fast_forward(&self, enabled: bool);

    fn rewind_frames(&self, frames: u32);
}
