//! End-to-end session scenarios against the null core

use se_core::{NativeCall, Requirement, SessionError, SessionOp};
use se_native::{CallLog, CoreCall, CoreSlot, NullCore, SurfaceHandle};
use se_session::{EmulationSession, SessionCommand, SessionHandle, SessionState, SurfaceEvent};
use std::path::Path;

fn slot_with(core: NullCore) -> (CoreSlot, CallLog) {
    let log = core.log();
    let slot = CoreSlot::initialize(Box::new(core), Path::new("/data")).unwrap();
    log.clear();
    (slot, log)
}

#[test]
fn test_launch_then_user_stop() {
    let (slot, log) = slot_with(NullCore::new());
    let handle = SessionHandle::spawn(
        EmulationSession::new(slot.acquire().unwrap()).with_system_dir("/data/bios"),
    )
    .unwrap();

    handle.surface_event(SurfaceEvent::Created(SurfaceHandle(4)));
    handle.execute(SessionCommand::LoadCore("cores/gb.so".into())).unwrap();
    handle.execute(SessionCommand::AttachSurface(SurfaceHandle(4))).unwrap();
    handle.execute(SessionCommand::LoadGame("roms/tetris.gb".into())).unwrap();
    let snapshot = handle.execute(SessionCommand::StartEmulation).unwrap();
    assert_eq!(snapshot.state, SessionState::Running);
    assert_eq!(snapshot.game_path.as_deref(), Some(Path::new("roms/tetris.gb")));

    let snapshot = handle.execute(SessionCommand::StopEmulation).unwrap();
    assert_eq!(snapshot.state, SessionState::Stopped);

    assert_eq!(
        log.calls(),
        vec![
            CoreCall::SetSystemDir("/data/bios".into()),
            CoreCall::LoadCore("cores/gb.so".into()),
            CoreCall::AttachSurface(SurfaceHandle(4)),
            CoreCall::LoadGame("roms/tetris.gb".into()),
            CoreCall::StartEmulation,
            CoreCall::StopEmulation,
            CoreCall::DetachSurface,
            CoreCall::UnloadCore,
        ]
    );

    // nothing left to release on close
    handle.close();
    assert_eq!(log.calls().len(), 8);
}

#[test]
fn test_bad_core_blocks_the_rest() {
    let (slot, log) = slot_with(NullCore::new().rejecting("bad.so"));
    let handle = SessionHandle::spawn(EmulationSession::new(slot.acquire().unwrap())).unwrap();

    let err = handle.execute(SessionCommand::LoadCore("bad.so".into())).unwrap_err();
    assert_eq!(err, SessionError::NativeCallFailed(NativeCall::LoadCore));
    assert_eq!(err.to_string(), "Native call loadCore failed");
    assert_eq!(handle.snapshot().state, SessionState::Idle);

    let err = handle
        .execute(SessionCommand::AttachSurface(SurfaceHandle(1)))
        .unwrap_err();
    assert_eq!(
        err,
        SessionError::NotReady {
            op: SessionOp::AttachSurface,
            missing: Requirement::Core,
        }
    );
    assert_eq!(log.calls(), vec![CoreCall::LoadCore("bad.so".into())]);
}

#[test]
fn test_surface_destroyed_while_running() {
    let (slot, log) = slot_with(NullCore::new());
    let handle = SessionHandle::spawn(EmulationSession::new(slot.acquire().unwrap())).unwrap();

    handle.execute(SessionCommand::LoadCore("core.so".into())).unwrap();
    handle.execute(SessionCommand::AttachSurface(SurfaceHandle(9))).unwrap();
    handle.execute(SessionCommand::LoadGame("game.gb".into())).unwrap();
    handle.execute(SessionCommand::StartEmulation).unwrap();
    log.clear();

    handle.surface_event(SurfaceEvent::Changed {
        surface: SurfaceHandle(9),
        width: 800,
        height: 480,
    });
    assert_eq!(handle.snapshot().surface_size, Some((800, 480)));

    let snapshot = handle.surface_destroyed(SurfaceHandle(9));
    assert_eq!(snapshot.state, SessionState::Stopped);
    assert_eq!(
        log.calls(),
        vec![CoreCall::StopEmulation, CoreCall::DetachSurface, CoreCall::UnloadCore]
    );

    let err = handle.execute(SessionCommand::StartEmulation).unwrap_err();
    assert!(err.is_not_ready());
    assert_eq!(log.calls().len(), 3);
}

#[test]
fn test_second_session_waits_for_lease() {
    let (slot, _log) = slot_with(NullCore::new());
    let first = SessionHandle::spawn(EmulationSession::new(slot.acquire().unwrap())).unwrap();
    assert!(slot.acquire().is_err());

    first.close();
    let second = SessionHandle::spawn(EmulationSession::new(slot.acquire().unwrap())).unwrap();
    second.execute(SessionCommand::LoadCore("core.so".into())).unwrap();
}

#[test]
fn test_controls_do_not_need_the_lease() {
    let (slot, log) = slot_with(NullCore::new());
    let handle = SessionHandle::spawn(EmulationSession::new(slot.acquire().unwrap())).unwrap();
    handle.execute(SessionCommand::LoadCore("core.so".into())).unwrap();

    let controls = slot.controls();
    controls.set_fast_forward(true);
    controls.rewind_frames(60);

    assert_eq!(
        log.controls(),
        vec![CoreCall::SetFastForward(true), CoreCall::RewindFrames(60)]
    );
}
