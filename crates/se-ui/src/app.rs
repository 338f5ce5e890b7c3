//! Main application

use crate::emulation::EmulationScreen;
use crate::library::{plan_launch, LaunchPlan, LibraryAction, LibraryView};
use crate::log_viewer::{LogLevel, LogViewer};
use crate::settings::SettingsPanel;
use eframe::egui;
use se_core::config::EmulationConfig;
use se_core::Config;
use se_input::{ContainerSize, ControlLayout, TouchOverlay};
use se_native::{CoreSlot, LibretroCore, SurfaceHandle, VideoOutput};
use se_session::{EmulationSession, SessionHandle, SessionState};
use se_storage::{AssetCategory, AssetStore};
use std::sync::Arc;

/// Overlay size assumed before the display area has been measured
const PROVISIONAL_CONTAINER: ContainerSize = ContainerSize {
    width: 1280.0,
    height: 720.0,
};

/// Main application state
pub struct SaasemuApp {
    config: Config,
    current_view: View,
    show_settings: bool,
    show_log_viewer: bool,
    show_about: bool,
    show_exit_confirm: bool,
    library: LibraryView,
    settings_panel: SettingsPanel,
    log_viewer: LogViewer,
    store: Option<AssetStore>,
    slot: Option<CoreSlot>,
    video: Option<Arc<VideoOutput>>,
    emulation: Option<EmulationScreen>,
    last_plan: Option<LaunchPlan>,
    next_surface: u64,
    error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Library,
    Emulation,
    Log,
}

impl SaasemuApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config) -> Self {
        let log_viewer = LogViewer::new();
        log_viewer.info("ui", "saasemu UI initialized");

        let mut error_message = None;

        let store = match AssetStore::open(&config.paths.data_dir) {
            Ok(store) => Some(store),
            Err(e) => {
                let msg = format!("Cannot open data directory: {}", e);
                log_viewer.error("storage", &msg);
                error_message = Some(msg);
                None
            }
        };

        let core = LibretroCore::new(config.emulation.frame_limit);
        let video = core.video();
        let slot = match CoreSlot::initialize(Box::new(core), &config.paths.data_dir) {
            Ok(slot) => {
                let controls = slot.controls();
                controls.set_fast_forward(config.emulation.fast_forward);
                Some(slot)
            }
            Err(e) => {
                let msg = format!("Native core interface unavailable: {}", e);
                log_viewer.error("native", &msg);
                error_message = Some(msg);
                None
            }
        };

        let mut library = LibraryView::new();
        if let Some(store) = &store {
            library.refresh(store);
        }

        cc.egui_ctx
            .send_viewport_cmd(egui::ViewportCommand::Fullscreen(config.emulation.fullscreen));

        let mut app = Self {
            config,
            current_view: View::Library,
            show_settings: false,
            show_log_viewer: false,
            show_about: false,
            show_exit_confirm: false,
            library,
            settings_panel: SettingsPanel::new(),
            log_viewer,
            store,
            slot,
            video: Some(video),
            emulation: None,
            last_plan: None,
            next_surface: 1,
            error_message,
        };

        if app.config.general.start_in_emulation {
            app.open_emulation();
        }
        app
    }

    fn emulation_state(&self) -> SessionState {
        self.emulation
            .as_ref()
            .map_or(SessionState::Idle, EmulationScreen::state)
    }

    fn load_layout(&self) -> Option<ControlLayout> {
        let custom = self.config.input.layout_path.as_deref();
        match ControlLayout::load(custom) {
            Ok(layout) => return Some(layout),
            Err(e) => self.log_viewer.log(
                LogLevel::Warn,
                "input",
                &format!("Control layout rejected: {}", e),
            ),
        }
        if custom.is_none() {
            return None;
        }
        ControlLayout::builtin()
            .map_err(|e| self.log_viewer.error("input", &format!("Built-in layout broken: {}", e)))
            .ok()
    }

    /// Create the emulation screen with a fresh session and surface
    fn open_emulation(&mut self) -> bool {
        if self.emulation.is_some() {
            self.current_view = View::Emulation;
            return true;
        }

        let Some(slot) = &self.slot else {
            self.error_message = Some("Native core interface unavailable".to_string());
            return false;
        };

        let lease = match slot.acquire() {
            Ok(lease) => lease,
            Err(e) => {
                self.log_viewer.error("session", &format!("Cannot start session: {}", e));
                return false;
            }
        };

        let mut session = EmulationSession::new(lease);
        if let Some(store) = &self.store {
            session = session.with_system_dir(store.dir(AssetCategory::Firmware));
        }

        let handle = match SessionHandle::spawn(session) {
            Ok(handle) => handle,
            Err(e) => {
                self.log_viewer.error("session", &format!("Cannot spawn session worker: {}", e));
                return false;
            }
        };

        let overlay = self
            .load_layout()
            .map(|layout| TouchOverlay::new(layout, slot.controls(), PROVISIONAL_CONTAINER));

        let surface = SurfaceHandle(self.next_surface);
        self.next_surface += 1;

        self.emulation = Some(EmulationScreen::new(handle, surface, overlay, self.video.clone()));
        self.current_view = View::Emulation;
        self.log_viewer.log(LogLevel::Debug, "ui", &format!("Emulation screen opened on {}", surface));
        true
    }

    /// Drop the emulation screen; this tears down the session
    fn close_emulation(&mut self) {
        if self.emulation.take().is_some() {
            self.log_viewer.log(LogLevel::Debug, "ui", "Emulation screen closed");
        }
        if let Some(video) = &self.video {
            video.clear();
        }
    }

    fn launch(&mut self, core: Option<String>, game: String) {
        let Some(store) = &self.store else {
            self.log_viewer.error("storage", "No data directory available");
            return;
        };

        let plan = match plan_launch(store, core.as_deref(), &game) {
            Ok(plan) => plan,
            Err(msg) => {
                self.log_viewer.error("library", &msg);
                return;
            }
        };

        if !self.open_emulation() {
            return;
        }
        if let Some(screen) = &mut self.emulation {
            screen.launch(&plan);
        }
        self.last_plan = Some(plan);
    }

    fn restart(&mut self) {
        if let Some(plan) = self.last_plan.clone() {
            if self.open_emulation() {
                if let Some(screen) = &mut self.emulation {
                    screen.launch(&plan);
                }
            }
        }
    }

    fn stop_emulation(&mut self) {
        if let Some(screen) = &mut self.emulation {
            screen.stop();
        }
    }

    fn import(&mut self, category: AssetCategory) {
        let Some(store) = &self.store else {
            self.log_viewer.error("storage", "No data directory available");
            return;
        };

        let Some(paths) = rfd::FileDialog::new()
            .set_title(format!("Import {}", category.label()))
            .pick_files()
        else {
            return;
        };

        for path in paths {
            match store.import_path(&path, category) {
                Ok(dest) => self.log_viewer.info(
                    "storage",
                    &format!(
                        "Imported {} into {}",
                        dest.file_name().unwrap_or_default().to_string_lossy(),
                        category.label()
                    ),
                ),
                Err(e) => self.log_viewer.error("storage", &format!("Import failed: {}", e)),
            }
        }
        self.library.refresh(store);
    }

    fn poll_session(&mut self) {
        let Some(screen) = &mut self.emulation else {
            return;
        };
        for outcome in screen.poll() {
            match outcome.result {
                Ok(snapshot) => {
                    if snapshot.state == SessionState::Running && outcome.label == "Start" {
                        self.log_viewer.info("session", "Emulation started");
                    } else {
                        self.log_viewer.log(
                            LogLevel::Debug,
                            "session",
                            &format!("{} done, now {:?}", outcome.label, snapshot.state),
                        );
                    }
                }
                Err(e) => self
                    .log_viewer
                    .error("session", &format!("{} failed: {}", outcome.label, e)),
            }
        }
    }

    /// Push changed emulation toggles to the core
    fn apply_emulation_changes(&mut self, ctx: &egui::Context, before: &EmulationConfig) {
        let after = &self.config.emulation;
        if before == after {
            return;
        }

        if before.fast_forward != after.fast_forward {
            if let Some(slot) = &self.slot {
                slot.controls().set_fast_forward(after.fast_forward);
            }
        }
        if before.fullscreen != after.fullscreen {
            ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(after.fullscreen));
        }
    }

    fn rewind(&self) {
        if !self.config.emulation.rewind_enabled {
            return;
        }
        if let Some(slot) = &self.slot {
            slot.controls().rewind_frames(self.config.emulation.rewind_step_frames);
        }
    }

    fn request_exit(&mut self, ctx: &egui::Context) {
        if self.config.general.confirm_exit && self.emulation_state() == SessionState::Running {
            self.show_exit_confirm = true;
        } else {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn save_config(&self) {
        if let Err(e) = self.config.save() {
            self.log_viewer.error("ui", &format!("Failed to save config: {}", e));
        }
    }

    fn show_emulation_view(&mut self, ui: &mut egui::Ui, state: SessionState) {
        ui.horizontal(|ui| {
            let busy = self.emulation.as_ref().is_some_and(EmulationScreen::is_busy);
            let can_start = !busy && state != SessionState::Running && self.last_plan.is_some();

            if ui.add_enabled(can_start, egui::Button::new("▶ Start")).clicked() {
                self.restart();
            }
            if ui
                .add_enabled(state == SessionState::Running, egui::Button::new("⏹ Stop"))
                .clicked()
            {
                self.stop_emulation();
            }

            ui.separator();

            let before = self.config.emulation.clone();
            ui.checkbox(&mut self.config.emulation.fast_forward, "⏩ Fast Forward");
            if self.config.emulation.rewind_enabled
                && ui
                    .add_enabled(state == SessionState::Running, egui::Button::new("⏪ Rewind"))
                    .clicked()
            {
                self.rewind();
            }
            if ui.button("⛶ Fullscreen").clicked() {
                self.config.emulation.fullscreen = !self.config.emulation.fullscreen;
            }
            self.apply_emulation_changes(ui.ctx(), &before);

            ui.separator();

            let (color, text) = match state {
                SessionState::Running => (egui::Color32::GREEN, "Running"),
                SessionState::Stopped => (egui::Color32::GRAY, "Stopped"),
                SessionState::Idle => (egui::Color32::GRAY, "Idle"),
                _ => (egui::Color32::YELLOW, "Loading"),
            };
            ui.colored_label(color, format!("● {}", text));
        });

        ui.separator();

        let config = &self.config;
        match &mut self.emulation {
            Some(screen) => ui.vertical_centered(|ui| screen.show(ui, config)).inner,
            None => {
                ui.centered_and_justified(|ui| {
                    ui.label("No emulation screen. Launch a game from the library.");
                });
            }
        }
    }
}

impl eframe::App for SaasemuApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_session();

        let emulation_state = self.emulation_state();

        // Menu bar
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    for category in AssetCategory::ALL {
                        if ui.button(format!("Import {}...", category.label())).clicked() {
                            self.import(category);
                            ui.close_menu();
                        }
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        self.request_exit(ctx);
                        ui.close_menu();
                    }
                });

                ui.menu_button("Emulation", |ui| {
                    let can_start = emulation_state != SessionState::Running && self.last_plan.is_some();
                    if ui.add_enabled(can_start, egui::Button::new("Start")).clicked() {
                        self.restart();
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(emulation_state == SessionState::Running, egui::Button::new("Stop"))
                        .clicked()
                    {
                        self.stop_emulation();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui
                        .add_enabled(self.emulation.is_some(), egui::Button::new("Close Screen"))
                        .clicked()
                    {
                        self.close_emulation();
                        self.current_view = View::Library;
                        ui.close_menu();
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui
                        .selectable_label(self.current_view == View::Library, "Library")
                        .clicked()
                    {
                        self.current_view = View::Library;
                        ui.close_menu();
                    }
                    if ui
                        .selectable_label(self.current_view == View::Emulation, "Emulation")
                        .clicked()
                    {
                        self.open_emulation();
                        ui.close_menu();
                    }
                    if ui
                        .selectable_label(self.current_view == View::Log, "Log")
                        .clicked()
                    {
                        self.current_view = View::Log;
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.checkbox(&mut self.show_log_viewer, "Log Window").clicked() {
                        ui.close_menu();
                    }
                    if ui
                        .checkbox(&mut self.config.input.show_overlay, "Touch Overlay")
                        .clicked()
                    {
                        self.save_config();
                        ui.close_menu();
                    }
                });

                ui.menu_button("Settings", |ui| {
                    if ui.button("Configuration...").clicked() {
                        self.show_settings = true;
                        ui.close_menu();
                    }
                });

                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        self.show_about = true;
                        ui.close_menu();
                    }
                });
            });
        });

        // Status bar
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let state_text = match emulation_state {
                    SessionState::Idle => "○ Idle",
                    SessionState::CoreLoaded => "◔ Core loaded",
                    SessionState::SurfaceAttached => "◑ Surface attached",
                    SessionState::GameLoaded => "◕ Game loaded",
                    SessionState::Running => "▶ Running",
                    SessionState::Stopped => "⏹ Stopped",
                };
                ui.label(state_text);

                ui.separator();
                ui.label(format!(
                    "Cores: {} | BIOS: {} | Games: {}",
                    self.library.count(AssetCategory::Cores),
                    self.library.count(AssetCategory::Firmware),
                    self.library.count(AssetCategory::Games),
                ));

                if let Some(screen) = &self.emulation {
                    let snapshot = screen.snapshot();
                    if let Some(path) = &snapshot.game_path {
                        ui.separator();
                        ui.label(format!(
                            "Game: {}",
                            path.file_name().unwrap_or_default().to_string_lossy()
                        ));
                    }
                    if let Some((w, h)) = snapshot.surface_size {
                        ui.separator();
                        ui.label(format!("{} {}x{}", screen.surface(), w, h));
                    }
                }
            });
        });

        // Main content
        egui::CentralPanel::default().show(ctx, |ui| match self.current_view {
            View::Library => {
                let action = self.library.show(ui);
                match action {
                    Some(LibraryAction::Import(category)) => self.import(category),
                    Some(LibraryAction::Launch { core, game }) => self.launch(core, game),
                    None => {}
                }
            }
            View::Emulation => self.show_emulation_view(ui, emulation_state),
            View::Log => {
                ui.heading("Log");
                ui.separator();
                self.log_viewer.show(ui);
            }
        });

        // Leaving the emulation view releases the surface
        if self.current_view != View::Emulation && self.emulation.is_some() {
            self.close_emulation();
        }

        // Log viewer window (floating)
        if self.show_log_viewer {
            egui::Window::new("Logs")
                .open(&mut self.show_log_viewer)
                .default_size([600.0, 400.0])
                .show(ctx, |ui| {
                    self.log_viewer.show(ui);
                });
        }

        // Settings window
        if self.show_settings {
            let mut close_requested = false;
            let before = self.config.emulation.clone();
            let mut changed = false;
            egui::Window::new("Settings")
                .open(&mut self.show_settings)
                .default_width(600.0)
                .default_height(500.0)
                .show(ctx, |ui| {
                    changed = self.settings_panel.show(ui, &mut self.config);

                    ui.separator();

                    if ui.button("Close").clicked() {
                        close_requested = true;
                    }
                });
            if changed {
                self.apply_emulation_changes(ctx, &before);
                self.save_config();
            }
            if close_requested {
                self.show_settings = false;
            }
        }

        // About window
        if self.show_about {
            egui::Window::new("About")
                .open(&mut self.show_about)
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.heading("saasemu");
                        ui.label("Libretro core host");
                        ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                        ui.add_space(10.0);
                        ui.separator();
                        ui.add_space(10.0);
                        ui.label("Licensed under GPL-3.0");
                    });
                });
        }

        // Exit confirmation
        if self.show_exit_confirm {
            egui::Window::new("Exit")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label("A game is running. Quit anyway?");
                    ui.horizontal(|ui| {
                        if ui.button("Quit").clicked() {
                            self.show_exit_confirm = false;
                            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                        if ui.button("Cancel").clicked() {
                            self.show_exit_confirm = false;
                        }
                    });
                });
        }

        // Error dialog
        let mut clear_error = false;
        if let Some(ref error) = self.error_message {
            let mut show_error = true;
            egui::Window::new("Error")
                .open(&mut show_error)
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.colored_label(egui::Color32::RED, "⚠ Error");
                    ui.separator();
                    ui.label(error.as_str());
                    ui.separator();
                    if ui.button("OK").clicked() {
                        clear_error = true;
                    }
                });
            if !show_error {
                clear_error = true;
            }
        }
        if clear_error {
            self.error_message = None;
        }

        self.log_viewer.show_toasts(ctx);

        // Keep polling while the session is live or replies are outstanding
        let busy = self.emulation.as_ref().is_some_and(EmulationScreen::is_busy);
        if emulation_state == SessionState::Running {
            ctx.request_repaint();
        } else if busy {
            ctx.request_repaint_after(std::time::Duration::from_millis(16));
        }
    }

    fn save(&mut self, _storage: &mut dyn eframe::Storage) {
        self.save_config();
    }
}

impl Drop for SaasemuApp {
    fn drop(&mut self) {
        self.close_emulation();
    }
}

/// Run the application
pub fn run(config: Config) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "saasemu",
        options,
        Box::new(|cc| Ok(Box::new(SaasemuApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("UI failed: {}", e))
}
