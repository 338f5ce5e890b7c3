//! Settings UI

use eframe::egui;
use se_core::config::*;

/// Settings panel
pub struct SettingsPanel {
    current_tab: SettingsTab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsTab {
    General,
    Emulation,
    Input,
    Paths,
    Debug,
}

impl SettingsPanel {
    pub fn new() -> Self {
        Self {
            current_tab: SettingsTab::Emulation,
        }
    }

    /// Show the settings panel. Returns true when something changed.
    pub fn show(&mut self, ui: &mut egui::Ui, config: &mut Config) -> bool {
        let mut changed = false;

        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.current_tab, SettingsTab::General, "General");
            ui.selectable_value(&mut self.current_tab, SettingsTab::Emulation, "Emulation");
            ui.selectable_value(&mut self.current_tab, SettingsTab::Input, "Input");
            ui.selectable_value(&mut self.current_tab, SettingsTab::Paths, "Paths");
            ui.selectable_value(&mut self.current_tab, SettingsTab::Debug, "Debug");
        });

        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| match self.current_tab {
            SettingsTab::General => changed |= Self::show_general(ui, &mut config.general),
            SettingsTab::Emulation => changed |= Self::show_emulation(ui, &mut config.emulation),
            SettingsTab::Input => changed |= Self::show_input(ui, &mut config.input),
            SettingsTab::Paths => changed |= Self::show_paths(ui, &mut config.paths),
            SettingsTab::Debug => changed |= Self::show_debug(ui, &mut config.debug),
        });

        changed
    }

    fn show_general(ui: &mut egui::Ui, config: &mut GeneralConfig) -> bool {
        let mut changed = false;

        ui.heading("General");
        ui.add_space(10.0);

        changed |= ui
            .checkbox(&mut config.confirm_exit, "Confirm Exit")
            .on_hover_text("Ask before leaving a running game")
            .changed();
        changed |= ui
            .checkbox(&mut config.start_in_emulation, "Open Emulation Screen on Start")
            .changed();

        changed
    }

    fn show_emulation(ui: &mut egui::Ui, config: &mut EmulationConfig) -> bool {
        let mut changed = false;

        ui.heading("Emulation");
        ui.add_space(10.0);

        changed |= ui
            .checkbox(&mut config.fast_forward, "Fast Forward")
            .on_hover_text("Run the core without frame pacing")
            .changed();
        changed |= ui.checkbox(&mut config.rewind_enabled, "Enable Rewind").changed();
        ui.add_enabled_ui(config.rewind_enabled, |ui| {
            changed |= ui
                .add(egui::Slider::new(&mut config.rewind_step_frames, 1..=600).text("Frames per rewind"))
                .changed();
        });

        ui.add_space(5.0);

        changed |= ui
            .checkbox(&mut config.linear_filtering, "Linear Filtering")
            .on_hover_text("Smooth the picture when scaling")
            .changed();
        changed |= ui.checkbox(&mut config.fullscreen, "Fullscreen").changed();

        ui.add_space(5.0);

        changed |= ui
            .add(egui::Slider::new(&mut config.frame_limit, 0..=240).text("Frame limit (0 = off)"))
            .on_hover_text("Takes effect on next start of the application")
            .changed();

        changed
    }

    fn show_input(ui: &mut egui::Ui, config: &mut InputConfig) -> bool {
        let mut changed = false;

        ui.heading("Touch Controls");
        ui.add_space(10.0);

        changed |= ui.checkbox(&mut config.show_overlay, "Show Overlay").changed();
        changed |= ui
            .add(egui::Slider::new(&mut config.overlay_opacity, 0.1..=1.0).text("Opacity"))
            .changed();

        ui.horizontal(|ui| {
            ui.label("Layout:");
            let current = config
                .layout_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in".to_string());
            ui.label(current);

            if ui.button("Choose...").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .set_title("Select Control Layout")
                    .add_filter("Layout", &["json"])
                    .pick_file()
                {
                    config.layout_path = Some(path);
                    changed = true;
                }
            }
            if config.layout_path.is_some() && ui.button("Reset").clicked() {
                config.layout_path = None;
                changed = true;
            }
        });
        ui.label(egui::RichText::new("Layout changes apply when the emulation screen is reopened.").weak());

        changed
    }

    fn show_paths(ui: &mut egui::Ui, config: &mut PathConfig) -> bool {
        let mut changed = false;

        ui.heading("Paths");
        ui.add_space(10.0);

        ui.horizontal(|ui| {
            ui.label("Data directory:");
            let mut path_str = config.data_dir.to_string_lossy().to_string();
            if ui.text_edit_singleline(&mut path_str).changed() {
                config.data_dir = std::path::PathBuf::from(path_str);
                changed = true;
            }
        });
        ui.label(egui::RichText::new("Cores, BIOS and games are stored here. Restart to apply.").weak());

        changed
    }

    fn show_debug(ui: &mut egui::Ui, config: &mut DebugConfig) -> bool {
        let mut changed = false;

        ui.heading("Debug");
        ui.add_space(10.0);

        ui.label("Log level (next start):");
        for (level, label) in [
            (LogLevel::Off, "Off"),
            (LogLevel::Error, "Error"),
            (LogLevel::Warn, "Warn"),
            (LogLevel::Info, "Info"),
            (LogLevel::Debug, "Debug"),
            (LogLevel::Trace, "Trace"),
        ] {
            changed |= ui.radio_value(&mut config.log_level, level, label).changed();
        }

        changed
    }
}

impl Default for SettingsPanel {
    fn default() -> Self {
        Self::new()
    }
}
