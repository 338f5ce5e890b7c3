//! User interface for saasemu

pub mod app;
pub mod emulation;
pub mod library;
pub mod log_viewer;
pub mod settings;

pub use app::SaasemuApp;
pub use log_viewer::{create_log_buffer, LogEntry, LogLevel, LogViewer, SharedLogBuffer};
