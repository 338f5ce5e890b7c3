//! Library view: imported cores, BIOS images and games

use eframe::egui;
use se_storage::{AssetCategory, AssetStore};
use std::collections::HashMap;
use std::path::PathBuf;

/// What the user asked the library for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryAction {
    Import(AssetCategory),
    /// Run `game`, with the chosen core if any
    Launch { core: Option<String>, game: String },
}

/// Core and game to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub core: PathBuf,
    pub game: PathBuf,
}

/// Pick the selected core, or the first one imported, to run `game`
pub fn plan_launch(
    store: &AssetStore,
    selected_core: Option<&str>,
    game: &str,
) -> Result<LaunchPlan, String> {
    let game = store
        .find_exact(AssetCategory::Games, game)
        .ok_or_else(|| format!("Game {} is no longer in the library", game))?;

    let core = match selected_core {
        Some(name) => store
            .find_exact(AssetCategory::Cores, name)
            .ok_or_else(|| format!("Core {} is no longer in the library", name))?,
        None => store
            .find_first_core()
            .ok_or_else(|| "No core imported. Import a core first.".to_string())?,
    };

    Ok(LaunchPlan { core, game })
}

fn matching<'a>(names: &'a [String], query: &str) -> Vec<&'a String> {
    let query = query.to_lowercase();
    names
        .iter()
        .filter(|n| query.is_empty() || n.to_lowercase().contains(&query))
        .collect()
}

pub struct LibraryView {
    listings: HashMap<AssetCategory, Vec<String>>,
    selected: HashMap<AssetCategory, String>,
    search_query: String,
}

impl LibraryView {
    pub fn new() -> Self {
        Self {
            listings: HashMap::new(),
            selected: HashMap::new(),
            search_query: String::new(),
        }
    }

    /// Re-read all three directories
    pub fn refresh(&mut self, store: &AssetStore) {
        for category in AssetCategory::ALL {
            let names = store.list_files(category);
            if let Some(sel) = self.selected.get(&category) {
                if !names.contains(sel) {
                    self.selected.remove(&category);
                }
            }
            self.listings.insert(category, names);
        }
    }

    pub fn selected(&self, category: AssetCategory) -> Option<&str> {
        self.selected.get(&category).map(String::as_str)
    }

    pub fn select(&mut self, category: AssetCategory, name: &str) {
        self.selected.insert(category, name.to_string());
    }

    fn launch_action(&self, game: String) -> LibraryAction {
        LibraryAction::Launch {
            core: self.selected(AssetCategory::Cores).map(str::to_string),
            game,
        }
    }

    pub fn count(&self, category: AssetCategory) -> usize {
        self.listings.get(&category).map_or(0, Vec::len)
    }

    pub fn show(&mut self, ui: &mut egui::Ui) -> Option<LibraryAction> {
        let mut action = None;

        let game = self.selected(AssetCategory::Games).map(str::to_string);
        let mut launch = false;
        ui.horizontal(|ui| {
            ui.label("Search:");
            ui.text_edit_singleline(&mut self.search_query);

            ui.separator();

            launch = ui
                .add_enabled(game.is_some(), egui::Button::new("▶ Launch"))
                .clicked();
        });
        if let (true, Some(game)) = (launch, game) {
            action = Some(self.launch_action(game));
        }

        ui.separator();

        ui.columns(3, |columns| {
            for (ui, category) in columns.iter_mut().zip(AssetCategory::ALL) {
                if let Some(a) = self.show_category(ui, category) {
                    action = Some(a);
                }
            }
        });

        action
    }

    fn show_category(&mut self, ui: &mut egui::Ui, category: AssetCategory) -> Option<LibraryAction> {
        let mut action = None;

        ui.horizontal(|ui| {
            ui.heading(category.label());
            if ui.button("➕ Import").clicked() {
                action = Some(LibraryAction::Import(category));
            }
        });
        ui.separator();

        let names = self.listings.get(&category).cloned().unwrap_or_default();
        let visible = matching(&names, &self.search_query);

        if visible.is_empty() {
            ui.label(egui::RichText::new("Nothing here yet").weak());
            return action;
        }

        egui::ScrollArea::vertical()
            .id_salt(category.dir_name())
            .show(ui, |ui| {
                for name in visible {
                    let is_selected = self.selected.get(&category) == Some(name);
                    let response = ui.selectable_label(is_selected, name);
                    if response.clicked() {
                        self.select(category, name);
                    }
                    if category == AssetCategory::Games && response.double_clicked() {
                        self.select(category, name);
                        action = Some(self.launch_action(name.clone()));
                    }
                }
            });

        action
    }
}

impl Default for LibraryView {
    fn default() -> Self {
        Self::new()
    }
}
