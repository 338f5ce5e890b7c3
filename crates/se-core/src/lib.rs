//! Core types for saasemu
//!
//! This crate provides the error taxonomy, configuration, and logging
//! infrastructure shared by every other crate of the host.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{
    LayoutError, NativeCall, NativeError, Requirement, SessionError, SessionOp, StorageError,
};
