//! Session worker thread
//!
//! Native calls can block, so the session lives on its own thread and the UI
//! talks to it through channels. Commands are answered through a [`Ticket`];
//! surface lifecycle events and the close request travel on a separate channel
//! that the worker always drains before picking up the next command. Commands
//! still queued when the session closes are answered with
//! [`SessionError::WorkerGone`].

use crate::session::{EmulationSession, SessionSnapshot};
use crossbeam::channel::{self, select, Receiver, Sender, TryRecvError};
use parking_lot::RwLock;
use se_core::SessionError;
use se_native::SurfaceHandle;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Result of a session command
pub type Reply = Result<SessionSnapshot, SessionError>;

/// A user-initiated session operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    LoadCore(PathBuf),
    AttachSurface(SurfaceHandle),
    LoadGame(PathBuf),
    StartEmulation,
    StopEmulation,
}

/// Display surface lifecycle notice from the hosting environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Created(SurfaceHandle),
    Changed {
        surface: SurfaceHandle,
        width: u32,
        height: u32,
    },
    Destroyed(SurfaceHandle),
}

struct Request {
    command: SessionCommand,
    reply: Sender<Reply>,
}

enum Lifecycle {
    Surface {
        event: SurfaceEvent,
        done: Sender<SessionSnapshot>,
    },
    Close(Sender<SessionSnapshot>),
}

/// Pending answer to a submitted command
#[derive(Debug)]
pub struct Ticket {
    rx: Option<Receiver<Reply>>,
}

impl Ticket {
    /// Take the reply if it has arrived. Returns `None` while pending and
    /// after the reply has been taken once.
    pub fn try_take(&mut self) -> Option<Reply> {
        let rx = self.rx.as_ref()?;
        let reply = match rx.try_recv() {
            Ok(reply) => reply,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(SessionError::WorkerGone),
        };
        self.rx = None;
        Some(reply)
    }

    /// Block until the reply arrives
    pub fn wait(mut self) -> Reply {
        match self.rx.take() {
            Some(rx) => rx.recv().unwrap_or(Err(SessionError::WorkerGone)),
            None => Err(SessionError::WorkerGone),
        }
    }

    /// Whether the reply has already been taken
    pub fn is_taken(&self) -> bool {
        self.rx.is_none()
    }
}

/// Owner of a session running on a worker thread
pub struct SessionHandle {
    commands: Sender<Request>,
    lifecycle: Sender<Lifecycle>,
    published: Arc<RwLock<SessionSnapshot>>,
    worker: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Move the session onto a new worker thread
    pub fn spawn(session: EmulationSession) -> std::io::Result<Self> {
        let (command_tx, command_rx) = channel::unbounded();
        let (lifecycle_tx, lifecycle_rx) = channel::unbounded();
        let published = Arc::new(RwLock::new(session.snapshot()));

        let shared = Arc::clone(&published);
        let worker = thread::Builder::new()
            .name("session".to_string())
            .spawn(move || run(session, command_rx, lifecycle_rx, shared))?;

        Ok(Self {
            commands: command_tx,
            lifecycle: lifecycle_tx,
            published,
            worker: Some(worker),
        })
    }

    /// Queue a command; the reply arrives on the returned ticket
    pub fn submit(&self, command: SessionCommand) -> Ticket {
        let (tx, rx) = channel::bounded(1);
        if self.commands.send(Request { command, reply: tx }).is_err() {
            tracing::warn!("Session worker is gone; command dropped");
        }
        Ticket { rx: Some(rx) }
    }

    /// Submit a command and wait for its reply
    pub fn execute(&self, command: SessionCommand) -> Reply {
        self.submit(command).wait()
    }

    /// Deliver a surface event and wait until the session has handled it.
    ///
    /// For `Destroyed` this returns only after any teardown finished, so the
    /// caller may release the surface afterwards.
    pub fn surface_event(&self, event: SurfaceEvent) -> SessionSnapshot {
        let (tx, rx) = channel::bounded(1);
        if self.lifecycle.send(Lifecycle::Surface { event, done: tx }).is_err() {
            return self.snapshot();
        }
        rx.recv().unwrap_or_else(|_| self.snapshot())
    }

    /// Deliver a surface event without waiting for it to be handled
    pub fn post_surface_event(&self, event: SurfaceEvent) {
        let (tx, _rx) = channel::bounded(1);
        if self.lifecycle.send(Lifecycle::Surface { event, done: tx }).is_err() {
            tracing::warn!("Session worker is gone; {:?} dropped", event);
        }
    }

    pub fn surface_destroyed(&self, surface: SurfaceHandle) -> SessionSnapshot {
        self.surface_event(SurfaceEvent::Destroyed(surface))
    }

    /// Latest published snapshot; never blocks on the worker
    pub fn snapshot(&self) -> SessionSnapshot {
        self.published.read().clone()
    }

    /// Tear the session down and join the worker
    pub fn close(mut self) -> SessionSnapshot {
        self.shutdown();
        self.snapshot()
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        // close overtakes queued commands
        let (tx, rx) = channel::bounded(1);
        if self.lifecycle.send(Lifecycle::Close(tx)).is_ok() {
            let _ = rx.recv();
        }
        if worker.join().is_err() {
            tracing::error!("Session worker panicked");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    mut session: EmulationSession,
    commands: Receiver<Request>,
    lifecycle: Receiver<Lifecycle>,
    published: Arc<RwLock<SessionSnapshot>>,
) {
    tracing::debug!("Session worker started");

    'worker: loop {
        // surface events take priority over queued commands
        while let Ok(msg) = lifecycle.try_recv() {
            if handle_lifecycle(&mut session, msg, &published) == Flow::Close {
                break 'worker;
            }
        }

        select! {
            recv(lifecycle) -> msg => match msg {
                Ok(msg) => {
                    if handle_lifecycle(&mut session, msg, &published) == Flow::Close {
                        break 'worker;
                    }
                }
                Err(_) => break 'worker,
            },
            recv(commands) -> msg => match msg {
                Ok(Request { command, reply }) => {
                    // a surface event or close that raced in goes first
                    while let Ok(msg) = lifecycle.try_recv() {
                        if handle_lifecycle(&mut session, msg, &published) == Flow::Close {
                            let _ = reply.send(Err(SessionError::WorkerGone));
                            break 'worker;
                        }
                    }
                    let result = apply(&mut session, command);
                    let snapshot = publish(&session, &published);
                    let _ = reply.send(result.map(|()| snapshot));
                }
                Err(_) => break 'worker,
            },
        }
    }

    session.close();
    publish(&session, &published);

    let mut abandoned = 0;
    for request in commands.try_iter() {
        let _ = request.reply.send(Err(SessionError::WorkerGone));
        abandoned += 1;
    }
    if abandoned > 0 {
        tracing::debug!("Session closed with {} commands still queued", abandoned);
    }
    tracing::debug!("Session worker stopped");
}

fn apply(session: &mut EmulationSession, command: SessionCommand) -> Result<(), SessionError> {
    tracing::trace!("Session command: {:?}", command);
    let result = match &command {
        SessionCommand::LoadCore(path) => session.load_core(path),
        SessionCommand::AttachSurface(surface) => session.attach_surface(*surface),
        SessionCommand::LoadGame(path) => session.load_game(path),
        SessionCommand::StartEmulation => session.start_emulation(),
        SessionCommand::StopEmulation => session.stop_emulation(),
    };
    if let Err(e) = &result {
        tracing::warn!("{:?} failed: {}", command, e);
    }
    result
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

fn handle_lifecycle(
    session: &mut EmulationSession,
    msg: Lifecycle,
    published: &RwLock<SessionSnapshot>,
) -> Flow {
    let (event, done) = match msg {
        Lifecycle::Surface { event, done } => (event, done),
        Lifecycle::Close(done) => {
            session.close();
            let _ = done.send(publish(session, published));
            return Flow::Close;
        }
    };

    match event {
        SurfaceEvent::Created(surface) => session.surface_created(surface),
        SurfaceEvent::Changed {
            surface,
            width,
            height,
        } => session.surface_changed(surface, width, height),
        SurfaceEvent::Destroyed(surface) => {
            session.surface_destroyed(surface);
        }
    }
    let _ = done.send(publish(session, published));
    Flow::Continue
}

fn publish(session: &EmulationSession, published: &RwLock<SessionSnapshot>) -> SessionSnapshot {
    let snapshot = session.snapshot();
    *published.write() = snapshot.clone();
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use se_native::{CallLog, CoreCall, CoreSlot, NullCore};
    use std::path::Path;

    fn spawn_with(core: NullCore) -> (SessionHandle, CallLog, CoreSlot) {
        let log = core.log();
        let slot = CoreSlot::initialize(Box::new(core), Path::new("/data")).unwrap();
        let handle = SessionHandle::spawn(EmulationSession::new(slot.acquire().unwrap())).unwrap();
        log.clear();
        (handle, log, slot)
    }

    fn launch(handle: &SessionHandle) {
        handle.execute(SessionCommand::LoadCore("core.so".into())).unwrap();
        handle.execute(SessionCommand::AttachSurface(SurfaceHandle(1))).unwrap();
        handle.execute(SessionCommand::LoadGame("game.gb".into())).unwrap();
        handle.execute(SessionCommand::StartEmulation).unwrap();
    }

    #[test]
    fn test_commands_round_trip() {
        let (handle, _log, _slot) = spawn_with(NullCore::new());
        launch(&handle);
        assert_eq!(handle.snapshot().state, SessionState::Running);
    }

    #[test]
    fn test_errors_are_reported() {
        let (handle, _log, _slot) = spawn_with(NullCore::new());
        let err = handle.execute(SessionCommand::StartEmulation).unwrap_err();
        assert!(err.is_not_ready());
        assert_eq!(handle.snapshot().state, SessionState::Idle);
    }

    #[test]
    fn test_ticket_taken_once() {
        let (handle, _log, _slot) = spawn_with(NullCore::new());
        let mut ticket = handle.submit(SessionCommand::LoadCore("core.so".into()));

        let reply = loop {
            if let Some(reply) = ticket.try_take() {
                break reply;
            }
            thread::yield_now();
        };
        assert_eq!(reply.unwrap().state, SessionState::CoreLoaded);
        assert!(ticket.is_taken());
        assert!(ticket.try_take().is_none());
    }

    #[test]
    fn test_surface_destroyed_blocks_until_teardown() {
        let (handle, log, _slot) = spawn_with(NullCore::new());
        launch(&handle);
        log.clear();

        let snapshot = handle.surface_destroyed(SurfaceHandle(1));
        assert_eq!(snapshot.state, SessionState::Stopped);
        assert_eq!(
            log.calls(),
            vec![CoreCall::StopEmulation, CoreCall::DetachSurface, CoreCall::UnloadCore]
        );
    }

    #[test]
    fn test_posted_events_precede_later_commands() {
        let (handle, _log, _slot) = spawn_with(NullCore::new());
        launch(&handle);

        handle.post_surface_event(SurfaceEvent::Changed {
            surface: SurfaceHandle(1),
            width: 320,
            height: 240,
        });
        let snapshot = handle.execute(SessionCommand::StartEmulation).unwrap();
        assert_eq!(snapshot.surface_size, Some((320, 240)));
    }

    #[test]
    fn test_destroyed_surface_is_not_reused() {
        let (handle, log, _slot) = spawn_with(NullCore::new());
        assert_eq!(handle.surface_destroyed(SurfaceHandle(7)).state, SessionState::Idle);

        handle.execute(SessionCommand::LoadCore("core.so".into())).unwrap();
        let err = handle
            .execute(SessionCommand::AttachSurface(SurfaceHandle(7)))
            .unwrap_err();
        assert!(err.is_not_ready());
        handle.execute(SessionCommand::LoadGame("game.gb".into())).unwrap();
        assert!(handle.execute(SessionCommand::StartEmulation).is_err());

        assert_ne!(handle.snapshot().state, SessionState::Running);
        assert!(!log.calls().contains(&CoreCall::AttachSurface(SurfaceHandle(7))));
        assert!(!log.calls().contains(&CoreCall::StartEmulation));
    }

    #[test]
    fn test_close_overtakes_queued_commands() {
        let core = NullCore::new();
        let log = core.log();
        let slot = CoreSlot::initialize(Box::new(core), Path::new("/data")).unwrap();
        let session = EmulationSession::new(slot.acquire().unwrap());
        log.clear();

        let (command_tx, command_rx) = channel::unbounded();
        let (lifecycle_tx, lifecycle_rx) = channel::unbounded();
        let published = Arc::new(RwLock::new(session.snapshot()));

        let mut tickets = Vec::new();
        for command in [
            SessionCommand::LoadCore("core.so".into()),
            SessionCommand::AttachSurface(SurfaceHandle(1)),
            SessionCommand::LoadGame("game.gb".into()),
            SessionCommand::StartEmulation,
        ] {
            let (tx, rx) = channel::bounded(1);
            command_tx.send(Request { command, reply: tx }).unwrap();
            tickets.push(Ticket { rx: Some(rx) });
        }
        let (done_tx, done_rx) = channel::bounded(1);
        lifecycle_tx.send(Lifecycle::Close(done_tx)).unwrap();

        let shared = Arc::clone(&published);
        let worker = thread::spawn(move || run(session, command_rx, lifecycle_rx, shared));
        assert_eq!(done_rx.recv().unwrap().state, SessionState::Idle);
        worker.join().unwrap();

        for ticket in tickets {
            assert_eq!(ticket.wait(), Err(SessionError::WorkerGone));
        }
        assert!(log.calls().is_empty());
        assert!(slot.is_available());
        drop(command_tx);
    }

    #[test]
    fn test_close_releases_lease() {
        let (handle, log, slot) = spawn_with(NullCore::new());
        launch(&handle);
        log.clear();

        let snapshot = handle.close();
        assert_eq!(snapshot.state, SessionState::Stopped);
        assert_eq!(log.lifecycle().len(), 3);
        assert!(slot.is_available());
    }

    #[test]
    fn test_drop_joins_worker() {
        let (handle, log, slot) = spawn_with(NullCore::new());
        handle.execute(SessionCommand::LoadCore("core.so".into())).unwrap();
        log.clear();

        drop(handle);
        assert_eq!(log.calls(), vec![CoreCall::StopEmulation, CoreCall::UnloadCore]);
        assert!(slot.is_available());
    }
}
