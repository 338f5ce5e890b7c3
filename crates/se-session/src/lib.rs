//! Emulation session for saasemu
//!
//! [`EmulationSession`] is the state machine that sequences native core calls;
//! [`SessionHandle`] runs one on a worker thread so the UI never blocks on a
//! native call.

pub mod session;
pub mod worker;

pub use session::{EmulationSession, SessionSnapshot, SessionState, TeardownReason};
pub use worker::{Reply, SessionCommand, SessionHandle, SurfaceEvent, Ticket};
