//! Error types for saasemu

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised around the native core module itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    #[error("Native core is already checked out by another session")]
    CoreBusy,

    #[error("Native core initialization failed (data directory {0})")]
    InitFailed(PathBuf),

    #[error("Failed to open core library {path}: {message}")]
    Library { path: PathBuf, message: String },

    #[error("Core library {path} does not export {symbol}")]
    MissingSymbol { path: PathBuf, symbol: &'static str },
}

/// Native calls that report success or failure synchronously
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeCall {
    LoadCore,
    AttachSurface,
    LoadGame,
    StartEmulation,
}

impl std::fmt::Display for NativeCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadCore => write!(f, "loadCore"),
            Self::AttachSurface => write!(f, "attachSurface"),
            Self::LoadGame => write!(f, "loadGame"),
            Self::StartEmulation => write!(f, "startEmulation"),
        }
    }
}

/// Session operations a caller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionOp {
    LoadCore,
    AttachSurface,
    LoadGame,
    StartEmulation,
    StopEmulation,
}

impl std::fmt::Display for SessionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadCore => write!(f, "load core"),
            Self::AttachSurface => write!(f, "attach surface"),
            Self::LoadGame => write!(f, "load game"),
            Self::StartEmulation => write!(f, "start emulation"),
            Self::StopEmulation => write!(f, "stop emulation"),
        }
    }
}

/// The piece of session state an operation found missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// No core is loaded
    Core,
    /// No display surface is attached
    Surface,
    /// No game is loaded
    Game,
    /// Emulation is not running
    Running,
    /// Emulation must be stopped first
    Stopped,
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Core => write!(f, "no core is loaded"),
            Self::Surface => write!(f, "no display surface is attached"),
            Self::Game => write!(f, "no game is loaded"),
            Self::Running => write!(f, "emulation is not running"),
            Self::Stopped => write!(f, "emulation is still running"),
        }
    }
}

/// Emulation session errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Precondition violation: the session is not in a state that permits the operation
    #[error("Cannot {op}: {missing}")]
    NotReady { op: SessionOp, missing: Requirement },

    /// The native core reported failure; session state is unchanged
    #[error("Native call {0} failed")]
    NativeCallFailed(NativeCall),

    #[error("{0}")]
    Native(#[from] NativeError),

    #[error("Session worker is no longer running")]
    WorkerGone,
}

impl SessionError {
    /// True for precondition violations as opposed to native failures
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
}

/// Asset store errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot read import source {name}: {source}")]
    SourceUnreadable {
        name: String,
        source: std::io::Error,
    },

    #[error("Cannot write {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid asset name: {0:?}")]
    InvalidName(String),
}

/// Control layout errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Malformed layout document: {0}")]
    Malformed(String),

    #[error("Cannot read layout {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("Control {id:?} position ({x}, {y}) is outside [0, 1]")]
    PositionOutOfRange { id: String, x: f64, y: f64 },

    #[error("Control {id:?} size {size} is outside (0, 1]")]
    SizeOutOfRange { id: String, size: f64 },
}
