//! Emulation screen: display surface, core video and the touch overlay
//!
//! The screen owns one [`SessionHandle`] and one display surface for as long
//! as it exists. Commands are queued on the session worker and their replies
//! picked up once per frame in [`EmulationScreen::poll`], so the UI thread
//! never waits on a native call. Dropping the screen destroys the surface,
//! which tears the session down before the worker is joined.

use crate::library::LaunchPlan;
use eframe::egui;
use se_core::Config;
use se_input::button::{BUTTON_PRESSED_RGB, BUTTON_RGB};
use se_input::dpad::DPAD_RGBA;
use se_input::{fill_alpha, ContainerSize, ControlWidget, Direction, PixelBounds, Touch, TouchOverlay, TouchPhase};
use se_native::{SurfaceHandle, VideoOutput};
use se_session::{SessionCommand, SessionHandle, SessionSnapshot, SessionState, SurfaceEvent, Ticket};
use std::collections::VecDeque;
use std::sync::Arc;

/// Pointer id used for mouse input when no touch device is present
const MOUSE_POINTER: u64 = u64::MAX;

/// Aspect ratio used until the core publishes its first frame
const DEFAULT_ASPECT: f32 = 4.0 / 3.0;

/// Reply to a command issued from the screen
#[derive(Debug)]
pub struct CommandOutcome {
    pub label: &'static str,
    pub result: se_session::Reply,
}

struct Pending {
    label: &'static str,
    ticket: Ticket,
}

pub struct EmulationScreen {
    session: SessionHandle,
    surface: SurfaceHandle,
    /// Last size reported to the session, in physical pixels
    surface_size: Option<(u32, u32)>,
    overlay: Option<TouchOverlay>,
    video: Option<Arc<VideoOutput>>,
    texture: Option<egui::TextureHandle>,
    texture_linear: bool,
    frame_size: Option<[usize; 2]>,
    seen_serial: u64,
    pending: VecDeque<Pending>,
    touch_seen: bool,
    mouse_down: bool,
}

impl EmulationScreen {
    pub fn new(
        session: SessionHandle,
        surface: SurfaceHandle,
        overlay: Option<TouchOverlay>,
        video: Option<Arc<VideoOutput>>,
    ) -> Self {
        Self {
            session,
            surface,
            surface_size: None,
            overlay,
            video,
            texture: None,
            texture_linear: true,
            frame_size: None,
            seen_serial: 0,
            pending: VecDeque::new(),
            touch_seen: false,
            mouse_down: false,
        }
    }

    pub fn surface(&self) -> SurfaceHandle {
        self.surface
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn state(&self) -> SessionState {
        self.session.snapshot().state
    }

    /// Whether commands are still waiting for a reply
    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty()
    }

    fn submit(&mut self, label: &'static str, command: SessionCommand) {
        let ticket = self.session.submit(command);
        self.pending.push_back(Pending { label, ticket });
    }

    /// Queue the full launch sequence for `plan`
    pub fn launch(&mut self, plan: &LaunchPlan) {
        tracing::info!(
            "Launching {} with {}",
            plan.game.display(),
            plan.core.display()
        );
        self.submit("Load core", SessionCommand::LoadCore(plan.core.clone()));
        self.submit("Attach surface", SessionCommand::AttachSurface(self.surface));
        self.submit("Load game", SessionCommand::LoadGame(plan.game.clone()));
        self.submit("Start", SessionCommand::StartEmulation);
    }

    pub fn stop(&mut self) {
        self.submit("Stop", SessionCommand::StopEmulation);
    }

    /// Collect replies that have arrived, in submission order.
    ///
    /// Once a command fails the replies of the commands queued behind it are
    /// dropped unreported; they fail for the same reason.
    pub fn poll(&mut self) -> Vec<CommandOutcome> {
        let mut outcomes = Vec::new();

        while let Some(front) = self.pending.front_mut() {
            let Some(result) = front.ticket.try_take() else {
                break;
            };
            let label = front.label;
            self.pending.pop_front();

            let failed = result.is_err();
            outcomes.push(CommandOutcome { label, result });
            if failed {
                self.pending.clear();
                break;
            }
        }

        outcomes
    }

    pub fn show(&mut self, ui: &mut egui::Ui, config: &Config) {
        let available = ui.available_size();
        let aspect = match self.frame_size {
            Some([w, h]) if h > 0 => w as f32 / h as f32,
            _ => DEFAULT_ASPECT,
        };
        let size = if available.x / available.y.max(1.0) > aspect {
            egui::vec2(available.y * aspect, available.y)
        } else {
            egui::vec2(available.x, available.x / aspect)
        };

        let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
        let ctx = ui.ctx().clone();

        self.sync_surface(rect, ctx.pixels_per_point());
        self.upload_frame(&ctx, config.emulation.linear_filtering);

        let state = self.state();
        if !state.is_live() {
            self.texture = None;
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, egui::Color32::BLACK);

        match &self.texture {
            Some(texture) => {
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                painter.image(texture.id(), rect, uv, egui::Color32::WHITE);
            }
            None => {
                let hint = match state {
                    SessionState::Idle => "Pick a game in the library to start",
                    SessionState::Stopped => "Stopped",
                    _ => "Loading...",
                };
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    hint,
                    egui::FontId::proportional(20.0),
                    egui::Color32::GRAY,
                );
            }
        }

        if config.input.show_overlay {
            self.route_input(ui, rect);
            if let Some(overlay) = &self.overlay {
                paint_overlay(&painter, rect, overlay, config.input.overlay_opacity);
            }
        } else if let Some(overlay) = &mut self.overlay {
            overlay.release_all();
        }
    }

    fn sync_surface(&mut self, rect: egui::Rect, pixels_per_point: f32) {
        let width = (rect.width() * pixels_per_point).round().max(1.0) as u32;
        let height = (rect.height() * pixels_per_point).round().max(1.0) as u32;

        if self.surface_size.is_none() {
            self.session.post_surface_event(SurfaceEvent::Created(self.surface));
        }
        if self.surface_size == Some((width, height)) {
            return;
        }

        self.session.post_surface_event(SurfaceEvent::Changed {
            surface: self.surface,
            width,
            height,
        });
        self.surface_size = Some((width, height));

        if let Some(overlay) = &mut self.overlay {
            overlay.relayout(ContainerSize::new(rect.width(), rect.height()));
        }
    }

    fn upload_frame(&mut self, ctx: &egui::Context, linear: bool) {
        // refetch the latest frame when the sampling mode changes
        if linear != self.texture_linear {
            self.texture_linear = linear;
            self.seen_serial = 0;
        }

        let Some(frame) = self.video.as_ref().and_then(|v| v.newer_than(self.seen_serial)) else {
            return;
        };

        let size = [frame.width as usize, frame.height as usize];
        if frame.rgba.len() != size[0] * size[1] * 4 {
            tracing::warn!("Dropping malformed {}x{} frame", frame.width, frame.height);
            self.seen_serial = frame.serial;
            return;
        }

        let image = egui::ColorImage::from_rgba_unmultiplied(size, &frame.rgba);
        let options = if linear {
            egui::TextureOptions::LINEAR
        } else {
            egui::TextureOptions::NEAREST
        };

        match &mut self.texture {
            Some(texture) => texture.set(image, options),
            None => self.texture = Some(ctx.load_texture("core-frame", image, options)),
        }
        self.frame_size = Some(size);
        self.seen_serial = frame.serial;
    }

    fn route_input(&mut self, ui: &egui::Ui, rect: egui::Rect) {
        let Some(overlay) = &mut self.overlay else {
            return;
        };

        let events = ui.input(|i| i.events.clone());
        let local = |pos: egui::Pos2| (pos.x - rect.min.x, pos.y - rect.min.y);

        for event in events {
            let touch = match event {
                egui::Event::Touch { id, phase, pos, .. } => {
                    self.touch_seen = true;
                    let phase = match phase {
                        egui::TouchPhase::Start => TouchPhase::Down,
                        egui::TouchPhase::Move => TouchPhase::Move,
                        egui::TouchPhase::End => TouchPhase::Up,
                        egui::TouchPhase::Cancel => TouchPhase::Cancel,
                    };
                    let (x, y) = local(pos);
                    Touch::new(id.0, phase, x, y)
                }
                egui::Event::PointerButton {
                    pos,
                    button: egui::PointerButton::Primary,
                    pressed,
                    ..
                } if !self.touch_seen => {
                    // releases outside the rect still count
                    if pressed && !rect.contains(pos) {
                        continue;
                    }
                    if !pressed && !self.mouse_down {
                        continue;
                    }
                    self.mouse_down = pressed;
                    let phase = if pressed { TouchPhase::Down } else { TouchPhase::Up };
                    let (x, y) = local(pos);
                    Touch::new(MOUSE_POINTER, phase, x, y)
                }
                egui::Event::PointerMoved(pos) if !self.touch_seen && self.mouse_down => {
                    let (x, y) = local(pos);
                    Touch::new(MOUSE_POINTER, TouchPhase::Move, x, y)
                }
                egui::Event::PointerGone if self.mouse_down => {
                    self.mouse_down = false;
                    Touch::new(MOUSE_POINTER, TouchPhase::Cancel, 0.0, 0.0)
                }
                _ => continue,
            };
            overlay.handle_touch(touch);
        }
    }
}

impl Drop for EmulationScreen {
    fn drop(&mut self) {
        // release held buttons while the core can still see them
        if let Some(mut overlay) = self.overlay.take() {
            overlay.release_all();
        }
        let snapshot = self.session.surface_destroyed(self.surface);
        tracing::debug!("{} destroyed, session {:?}", self.surface, snapshot.state);
    }
}

fn with_opacity(alpha: u8, opacity: f32) -> u8 {
    (alpha as f32 * opacity.clamp(0.0, 1.0)).round() as u8
}

fn widget_rect(origin: egui::Pos2, bounds: PixelBounds) -> egui::Rect {
    egui::Rect::from_min_size(
        origin + egui::vec2(bounds.left as f32, bounds.top as f32),
        egui::Vec2::splat(bounds.side as f32),
    )
}

fn paint_overlay(painter: &egui::Painter, rect: egui::Rect, overlay: &TouchOverlay, opacity: f32) {
    for widget in overlay.widgets() {
        let area = widget_rect(rect.min, widget.bounds());
        let radius = area.width() / 2.0;

        match widget {
            ControlWidget::Button(button) => {
                let pressed = button.is_pressed();
                let [r, g, b] = if pressed { BUTTON_PRESSED_RGB } else { BUTTON_RGB };
                let fill = egui::Color32::from_rgba_unmultiplied(
                    r,
                    g,
                    b,
                    with_opacity(fill_alpha(pressed), opacity),
                );
                painter.circle_filled(area.center(), radius, fill);

                let label = button.id().strip_prefix("btn").unwrap_or(button.id());
                painter.text(
                    area.center(),
                    egui::Align2::CENTER_CENTER,
                    label,
                    egui::FontId::proportional((radius * 0.6).max(8.0)),
                    egui::Color32::from_white_alpha(with_opacity(200, opacity)),
                );
            }
            ControlWidget::Dpad(dpad) => {
                let [r, g, b, a] = DPAD_RGBA;
                let fill = egui::Color32::from_rgba_unmultiplied(r, g, b, with_opacity(a, opacity));
                painter.circle_filled(area.center(), radius, fill);

                let offset = match dpad.direction() {
                    Direction::Neutral => None,
                    Direction::Up => Some(egui::vec2(0.0, -1.0)),
                    Direction::Down => Some(egui::vec2(0.0, 1.0)),
                    Direction::Left => Some(egui::vec2(-1.0, 0.0)),
                    Direction::Right => Some(egui::vec2(1.0, 0.0)),
                };
                if let Some(offset) = offset {
                    let highlight = egui::Color32::from_rgba_unmultiplied(r, g, b, with_opacity(200, opacity));
                    painter.circle_filled(area.center() + offset * radius * 0.6, radius * 0.3, highlight);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use se_input::ControlLayout;
    use se_native::{CallLog, CoreCall, CoreSlot, NullCore};
    use se_session::EmulationSession;
    use std::path::Path;
    use std::thread;

    fn screen() -> (EmulationScreen, CallLog, CoreSlot) {
        let core = NullCore::new();
        let log = core.log();
        let slot = CoreSlot::initialize(Box::new(core), Path::new("/data")).unwrap();
        let session = SessionHandle::spawn(EmulationSession::new(slot.acquire().unwrap())).unwrap();
        let overlay = TouchOverlay::new(
            ControlLayout::builtin().unwrap(),
            slot.controls(),
            ContainerSize::new(800.0, 480.0),
        );
        log.clear();
        (
            EmulationScreen::new(session, SurfaceHandle(7), Some(overlay), None),
            log,
            slot,
        )
    }

    fn plan() -> LaunchPlan {
        LaunchPlan {
            core: "cores/gb.so".into(),
            game: "roms/tetris.gb".into(),
        }
    }

    fn drain(screen: &mut EmulationScreen) -> Vec<CommandOutcome> {
        let mut outcomes = Vec::new();
        while screen.is_busy() {
            outcomes.extend(screen.poll());
            thread::yield_now();
        }
        outcomes
    }

    #[test]
    fn test_launch_runs_full_sequence() {
        let (mut screen, log, _slot) = screen();
        screen.launch(&plan());

        let outcomes = drain(&mut screen);
        let labels: Vec<_> = outcomes.iter().map(|o| o.label).collect();
        assert_eq!(labels, vec!["Load core", "Attach surface", "Load game", "Start"]);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        assert_eq!(screen.state(), SessionState::Running);
        assert!(log.lifecycle().contains(&CoreCall::StartEmulation));
    }

    #[test]
    fn test_failure_drops_queued_replies() {
        let (mut screen, _log, _slot) = screen();
        screen.submit("Start", SessionCommand::StartEmulation);
        screen.submit("Stop", SessionCommand::StopEmulation);

        let outcomes = drain(&mut screen);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_err());
    }

    #[test]
    fn test_drop_tears_down_and_frees_core() {
        let (mut screen, log, slot) = screen();
        screen.launch(&plan());
        drain(&mut screen);
        log.clear();

        drop(screen);
        let calls = log.lifecycle();
        assert_eq!(
            calls,
            vec![CoreCall::StopEmulation, CoreCall::DetachSurface, CoreCall::UnloadCore]
        );
        assert!(slot.is_available());
    }

    #[test]
    fn test_opacity_scales_alpha() {
        assert_eq!(with_opacity(120, 1.0), 120);
        assert_eq!(with_opacity(120, 0.5), 60);
        assert_eq!(with_opacity(180, 2.0), 180);
    }
}
