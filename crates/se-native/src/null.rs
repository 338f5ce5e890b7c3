//! Null core for testing and headless runs
//!
//! Accepts every call, records it in a shared [`CallLog`], and can be told to
//! fail specific calls or specific paths.

use crate::interface::{ButtonCode, CoreControls, CoreInterface, SurfaceHandle};
use parking_lot::Mutex;
use se_core::NativeCall;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A call received by the null core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCall {
    Init(PathBuf),
    SetSystemDir(PathBuf),
    LoadCore(PathBuf),
    AttachSurface(SurfaceHandle),
    LoadGame(PathBuf),
    StartEmulation,
    StopEmulation,
    DetachSurface,
    UnloadCore,
    SetButtonState(ButtonCode, bool),
    SetFastForward(bool),
    RewindFrames(u32),
}

impl CoreCall {
    /// True for calls made through [`CoreControls`]
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            CoreCall::SetButtonState(..) | CoreCall::SetFastForward(_) | CoreCall::RewindFrames(_)
        )
    }
}

/// Shared, clonable record of calls in arrival order
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<CoreCall>>>);

impl CallLog {
    fn push(&self, call: CoreCall) {
        self.0.lock().push(call);
    }

    /// Every recorded call
    pub fn calls(&self) -> Vec<CoreCall> {
        self.0.lock().clone()
    }

    /// Recorded lifecycle calls, without the side-channel controls
    pub fn lifecycle(&self) -> Vec<CoreCall> {
        self.0.lock().iter().filter(|c| !c.is_control()).cloned().collect()
    }

    /// Recorded side-channel calls only
    pub fn controls(&self) -> Vec<CoreCall> {
        self.0.lock().iter().filter(|c| c.is_control()).cloned().collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

#[derive(Debug, Default)]
struct FailurePlan {
    init: bool,
    calls: HashSet<NativeCall>,
    paths: HashSet<PathBuf>,
}

/// Handle for changing which calls fail after the core has been moved away
#[derive(Debug, Clone)]
pub struct FailureInjector(Arc<Mutex<FailurePlan>>);

impl FailureInjector {
    pub fn fail(&self, call: NativeCall) {
        self.0.lock().calls.insert(call);
    }

    pub fn recover(&self, call: NativeCall) {
        self.0.lock().calls.remove(&call);
    }

    /// Make `load_core`/`load_game` fail for this path
    pub fn reject_path(&self, path: impl Into<PathBuf>) {
        self.0.lock().paths.insert(path.into());
    }
}

struct NullControls {
    log: CallLog,
}

impl CoreControls for NullControls {
    fn set_button_state(&self, code: ButtonCode, pressed: bool) {
        self.log.push(CoreCall::SetButtonState(code, pressed));
    }

    fn set_fast_forward(&self, enabled: bool) {
        self.log.push(CoreCall::SetFastForward(enabled));
    }

    fn rewind_frames(&self, frames: u32) {
        self.log.push(CoreCall::RewindFrames(frames));
    }
}

/// Recording core that performs no emulation
pub struct NullCore {
    log: CallLog,
    plan: Arc<Mutex<FailurePlan>>,
    controls: Arc<NullControls>,
}

impl NullCore {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            controls: Arc::new(NullControls { log: log.clone() }),
            log,
            plan: Arc::new(Mutex::new(FailurePlan::default())),
        }
    }

    /// Shared log of the calls this core receives
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn injector(&self) -> FailureInjector {
        FailureInjector(Arc::clone(&self.plan))
    }

    pub fn failing_init(self) -> Self {
        self.plan.lock().init = true;
        self
    }

    pub fn failing(self, call: NativeCall) -> Self {
        self.plan.lock().calls.insert(call);
        self
    }

    pub fn rejecting(self, path: impl Into<PathBuf>) -> Self {
        self.plan.lock().paths.insert(path.into());
        self
    }

    fn succeeds(&self, call: NativeCall, path: Option<&Path>) -> bool {
        let plan = self.plan.lock();
        if plan.calls.contains(&call) {
            return false;
        }
        !path.is_some_and(|p| plan.paths.contains(p))
    }
}

impl Default for NullCore {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreInterface for NullCore {
    fn init(&mut self, data_dir: &Path) -> bool {
        self.log.push(CoreCall::Init(data_dir.to_path_buf()));
        !self.plan.lock().init
    }

    fn set_system_dir(&mut self, dir: &Path) {
        self.log.push(CoreCall::SetSystemDir(dir.to_path_buf()));
    }

    fn load_core(&mut self, path: &Path) -> bool {
        self.log.push(CoreCall::LoadCore(path.to_path_buf()));
        self.succeeds(NativeCall::LoadCore, Some(path))
    }

    fn attach_surface(&mut self, surface: SurfaceHandle) -> bool {
        self.log.push(CoreCall::AttachSurface(surface));
        self.succeeds(NativeCall::AttachSurface, None)
    }

    fn load_game(&mut self, path: &Path) -> bool {
        self.log.push(CoreCall::LoadGame(path.to_path_buf()));
        self.succeeds(NativeCall::LoadGame, Some(path))
    }

    fn start_emulation(&mut self) -> bool {
        self.log.push(CoreCall::StartEmulation);
        self.succeeds(NativeCall::StartEmulation, None)
    }

    fn stop_emulation(&mut self) {
        self.log.push(CoreCall::StopEmulation);
    }

    fn detach_surface(&mut self) {
        self.log.push(CoreCall::DetachSurface);
    }

    fn unload_core(&mut self) {
        self.log.push(CoreCall::UnloadCore);
    }

    fn controls(&self) -> Arc<dyn CoreControls> {
        self.controls.clone()
    }
}
