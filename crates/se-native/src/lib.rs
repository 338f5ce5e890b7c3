//! Native core interface for saasemu
//!
//! The emulation core is an external module with a fixed call contract. This
//! crate describes that contract ([`CoreInterface`], [`CoreControls`]), owns
//! the single process-wide instance ([`CoreSlot`]), and provides two
//! implementations: [`NullCore`] for tests and headless runs, and
//! [`LibretroCore`] for real libretro shared libraries.

pub mod interface;
pub mod libretro;
pub mod null;
pub mod slot;
pub mod video;

pub use interface::{ButtonCode, CoreControls, CoreInterface, SurfaceHandle};
pub use libretro::{LibretroControls, LibretroCore};
pub use null::{CallLog, CoreCall, FailureInjector, NullCore};
pub use slot::{CoreLease, CoreSlot};
pub use video::{PixelFormat, VideoFrame, VideoOutput};
