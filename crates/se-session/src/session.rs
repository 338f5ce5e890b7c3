//! Emulation session state machine
//!
//! The session sequences the native core calls for one core + game + surface
//! lifecycle:
//!
//! `Idle → CoreLoaded → SurfaceAttached → GameLoaded → Running`, with `Stopped`
//! reached from any live state once the native resources are released.
//!
//! Every way out of a live session (user stop, surface destruction, loading a
//! different core, closing the screen) goes through [`EmulationSession::teardown`],
//! which issues `stop → detach → unload` in that order and at most once.

use se_core::{NativeCall, Requirement, SessionError, SessionOp};
use se_native::{CoreLease, SurfaceHandle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    /// No core loaded yet
    Idle,
    /// Core loaded, nothing else
    CoreLoaded,
    /// Core loaded and a surface attached
    SurfaceAttached,
    /// Game loaded (a surface may or may not be attached)
    GameLoaded,
    /// Emulation running
    Running,
    /// Native resources released; a new `load_core` starts over
    Stopped,
}

impl SessionState {
    /// True while the session holds native resources
    pub fn is_live(&self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Stopped)
    }
}

/// Why a teardown happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    UserStop,
    SurfaceDestroyed,
    CoreReload,
    Closed,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub core_path: Option<PathBuf>,
    pub game_path: Option<PathBuf>,
    pub surface: Option<SurfaceHandle>,
    pub surface_size: Option<(u32, u32)>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            core_path: None,
            game_path: None,
            surface: None,
            surface_size: None,
        }
    }
}

/// One core + game + surface lifecycle against the native core
pub struct EmulationSession {
    /// Exclusive access to the native core
    lease: CoreLease,
    /// Firmware directory announced before every core load
    system_dir: Option<PathBuf>,
    /// Core that most recently loaded successfully
    core_path: Option<PathBuf>,
    /// Game that most recently loaded successfully
    game_path: Option<PathBuf>,
    /// Surface that is currently attached
    surface: Option<SurfaceHandle>,
    /// Last size reported for the attached surface
    surface_size: Option<(u32, u32)>,
    /// Most recent size report for any surface, kept for a later attach
    reported: Option<(SurfaceHandle, u32, u32)>,
    /// Handles the host has destroyed and not created again
    destroyed: HashSet<SurfaceHandle>,
    running: bool,
    torn_down: bool,
    state: SessionState,
}

impl EmulationSession {
    /// Create an idle session holding the core lease
    pub fn new(lease: CoreLease) -> Self {
        tracing::debug!("Creating emulation session");
        Self {
            lease,
            system_dir: None,
            core_path: None,
            game_path: None,
            surface: None,
            surface_size: None,
            reported: None,
            destroyed: HashSet::new(),
            running: false,
            torn_down: false,
            state: SessionState::Idle,
        }
    }

    /// Announce this firmware directory to the core before each core load
    pub fn with_system_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.system_dir = Some(dir.into());
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn core_path(&self) -> Option<&Path> {
        self.core_path.as_deref()
    }

    pub fn game_path(&self) -> Option<&Path> {
        self.game_path.as_deref()
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            core_path: self.core_path.clone(),
            game_path: self.game_path.clone(),
            surface: self.surface,
            surface_size: self.surface_size,
        }
    }

    fn settle(&mut self) {
        let next = if self.running {
            SessionState::Running
        } else if self.core_path.is_none() {
            if self.torn_down {
                SessionState::Stopped
            } else {
                SessionState::Idle
            }
        } else if self.game_path.is_some() {
            SessionState::GameLoaded
        } else if self.surface.is_some() {
            SessionState::SurfaceAttached
        } else {
            SessionState::CoreLoaded
        };

        if next != self.state {
            tracing::debug!("Session {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Load a core. A core that is already loaded is torn down first, so two
    /// cores are never held at once.
    pub fn load_core(&mut self, path: &Path) -> Result<(), SessionError> {
        if self.core_path.is_some() {
            self.teardown(TeardownReason::CoreReload);
        }

        tracing::info!("Loading core: {}", path.display());
        let loaded = {
            let mut core = self.lease.core();
            if let Some(dir) = &self.system_dir {
                core.set_system_dir(dir);
            }
            core.load_core(path)
        };

        if !loaded {
            tracing::warn!("Core failed to load: {}", path.display());
            return Err(SessionError::NativeCallFailed(NativeCall::LoadCore));
        }

        self.core_path = Some(path.to_path_buf());
        self.torn_down = false;
        self.settle();
        Ok(())
    }

    /// Attach the display surface. Re-attaching the same surface is a no-op.
    pub fn attach_surface(&mut self, surface: SurfaceHandle) -> Result<(), SessionError> {
        if self.core_path.is_none() {
            return Err(SessionError::NotReady {
                op: SessionOp::AttachSurface,
                missing: Requirement::Core,
            });
        }
        if self.destroyed.contains(&surface) {
            tracing::warn!("Refusing to attach destroyed {}", surface);
            return Err(SessionError::NotReady {
                op: SessionOp::AttachSurface,
                missing: Requirement::Surface,
            });
        }
        if self.surface == Some(surface) {
            tracing::debug!("{} already attached", surface);
            return Ok(());
        }

        if !self.lease.core().attach_surface(surface) {
            tracing::warn!("Failed to attach {}", surface);
            return Err(SessionError::NativeCallFailed(NativeCall::AttachSurface));
        }

        tracing::info!("Attached {}", surface);
        self.surface_size = self
            .reported
            .filter(|(reported, _, _)| *reported == surface)
            .map(|(_, w, h)| (w, h));
        self.surface = Some(surface);
        self.settle();
        Ok(())
    }

    /// Load a game image. Needs a core but not a surface.
    pub fn load_game(&mut self, path: &Path) -> Result<(), SessionError> {
        if self.core_path.is_none() {
            return Err(SessionError::NotReady {
                op: SessionOp::LoadGame,
                missing: Requirement::Core,
            });
        }
        if self.running {
            return Err(SessionError::NotReady {
                op: SessionOp::LoadGame,
                missing: Requirement::Stopped,
            });
        }

        tracing::info!("Loading game: {}", path.display());
        if !self.lease.core().load_game(path) {
            tracing::warn!("Game failed to load: {}", path.display());
            return Err(SessionError::NativeCallFailed(NativeCall::LoadGame));
        }

        self.game_path = Some(path.to_path_buf());
        self.settle();
        Ok(())
    }

    /// Start emulation. Needs a core, an attached surface, and a game.
    pub fn start_emulation(&mut self) -> Result<(), SessionError> {
        if self.running {
            tracing::debug!("Emulation already running");
            return Ok(());
        }

        let missing = if self.core_path.is_none() {
            Some(Requirement::Core)
        } else if self.surface.is_none() {
            Some(Requirement::Surface)
        } else if self.game_path.is_none() {
            Some(Requirement::Game)
        } else {
            None
        };
        if let Some(missing) = missing {
            return Err(SessionError::NotReady {
                op: SessionOp::StartEmulation,
                missing,
            });
        }

        if !self.lease.core().start_emulation() {
            tracing::warn!("Core refused to start emulation");
            return Err(SessionError::NativeCallFailed(NativeCall::StartEmulation));
        }

        tracing::info!("Emulation started");
        self.running = true;
        self.settle();
        Ok(())
    }

    /// Stop emulation and release the surface and the core
    pub fn stop_emulation(&mut self) -> Result<(), SessionError> {
        if !self.running {
            return Err(SessionError::NotReady {
                op: SessionOp::StopEmulation,
                missing: Requirement::Running,
            });
        }
        self.teardown(TeardownReason::UserStop);
        Ok(())
    }

    /// Record a surface creation reported by the host. A handle that was
    /// destroyed earlier becomes attachable again.
    pub fn surface_created(&mut self, surface: SurfaceHandle) {
        if self.destroyed.remove(&surface) {
            tracing::debug!("{} recreated", surface);
        } else {
            tracing::debug!("{} created", surface);
        }
    }

    /// Record a new size for a surface
    pub fn surface_changed(&mut self, surface: SurfaceHandle, width: u32, height: u32) {
        self.reported = Some((surface, width, height));
        if self.surface == Some(surface) {
            self.surface_size = Some((width, height));
        }
        tracing::debug!("{} changed to {}x{}", surface, width, height);
    }

    /// React to the host destroying a surface. Returns true if the session
    /// was torn down.
    pub fn surface_destroyed(&mut self, surface: SurfaceHandle) -> bool {
        self.destroyed.insert(surface);
        if self.reported.is_some_and(|(reported, _, _)| reported == surface) {
            self.reported = None;
        }
        if let Some(attached) = self.surface {
            if attached != surface {
                tracing::debug!("Ignoring destruction of unattached {}", surface);
                return false;
            }
        }
        if self.core_path.is_none() {
            return false;
        }

        self.teardown(TeardownReason::SurfaceDestroyed);
        true
    }

    /// Release everything; used when the screen goes away
    pub fn close(&mut self) {
        self.teardown(TeardownReason::Closed);
    }

    /// Issue `stop → detach → unload` for whatever is live and forget it.
    fn teardown(&mut self, reason: TeardownReason) {
        // a surface is only ever attached while a core is loaded
        if self.core_path.is_none() {
            return;
        }

        tracing::info!("Tearing down session ({:?})", reason);
        {
            let mut core = self.lease.core();
            core.stop_emulation();
            if self.surface.is_some() {
                core.detach_surface();
            }
            core.unload_core();
        }

        self.running = false;
        self.surface = None;
        self.surface_size = None;
        self.game_path = None;
        self.core_path = None;
        self.torn_down = true;
        self.settle();
    }
}

impl Drop for EmulationSession {
    fn drop(&mut self) {
        self.teardown(TeardownReason::Closed);
    }
}
