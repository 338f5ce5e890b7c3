//! Notification log and toasts
//!
//! Everything the shell reports to the user lands in one shared buffer. The
//! log window lists it; warnings and errors also pop up briefly as toasts.

use eframe::egui;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum number of log entries to keep
const MAX_LOG_ENTRIES: usize = 2000;

/// How long a toast stays on screen
const TOAST_DURATION: Duration = Duration::from_secs(4);

/// Most toasts shown at once
const MAX_TOASTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn color(&self) -> egui::Color32 {
        match self {
            LogLevel::Debug => egui::Color32::LIGHT_BLUE,
            LogLevel::Info => egui::Color32::WHITE,
            LogLevel::Warn => egui::Color32::YELLOW,
            LogLevel::Error => egui::Color32::RED,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn is_alert(&self) -> bool {
        *self >= LogLevel::Warn
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Subsystem that reported it ("session", "storage", ...)
    pub source: String,
    pub message: String,
    pub timestamp: Instant,
}

impl LogEntry {
    fn matches(&self, min_level: LogLevel, filter_lower: &str) -> bool {
        self.level >= min_level
            && (filter_lower.is_empty()
                || self.message.to_lowercase().contains(filter_lower)
                || self.source.to_lowercase().contains(filter_lower))
    }
}

/// Shared log buffer
pub type SharedLogBuffer = Arc<RwLock<VecDeque<LogEntry>>>;

pub fn create_log_buffer() -> SharedLogBuffer {
    Arc::new(RwLock::new(VecDeque::with_capacity(MAX_LOG_ENTRIES)))
}

/// Append an entry, dropping the oldest when full, and mirror it to tracing
pub fn add_log_entry(buffer: &SharedLogBuffer, level: LogLevel, source: &str, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!(target: "saasemu::ui", "[{}] {}", source, message),
        LogLevel::Info => tracing::info!(target: "saasemu::ui", "[{}] {}", source, message),
        LogLevel::Warn => tracing::warn!(target: "saasemu::ui", "[{}] {}", source, message),
        LogLevel::Error => tracing::error!(target: "saasemu::ui", "[{}] {}", source, message),
    }

    let mut logs = buffer.write();
    if logs.len() >= MAX_LOG_ENTRIES {
        logs.pop_front();
    }
    logs.push_back(LogEntry {
        level,
        source: source.to_string(),
        message: message.to_string(),
        timestamp: Instant::now(),
    });
}

/// Warnings and errors younger than the toast duration, newest last
fn recent_alerts(logs: &VecDeque<LogEntry>, now: Instant) -> Vec<LogEntry> {
    let mut alerts: Vec<LogEntry> = logs
        .iter()
        .rev()
        .take_while(|e| now.saturating_duration_since(e.timestamp) < TOAST_DURATION)
        .filter(|e| e.level.is_alert())
        .take(MAX_TOASTS)
        .cloned()
        .collect();
    alerts.reverse();
    alerts
}

/// Log window state
pub struct LogViewer {
    log_buffer: SharedLogBuffer,
    min_level: LogLevel,
    filter_text: String,
    auto_scroll: bool,
    show_timestamps: bool,
}

impl LogViewer {
    pub fn new() -> Self {
        Self::with_buffer(create_log_buffer())
    }

    pub fn with_buffer(buffer: SharedLogBuffer) -> Self {
        Self {
            log_buffer: buffer,
            min_level: LogLevel::Info,
            filter_text: String::new(),
            auto_scroll: true,
            show_timestamps: false,
        }
    }

    pub fn buffer(&self) -> SharedLogBuffer {
        Arc::clone(&self.log_buffer)
    }

    pub fn log(&self, level: LogLevel, source: &str, message: &str) {
        add_log_entry(&self.log_buffer, level, source, message);
    }

    pub fn info(&self, source: &str, message: &str) {
        self.log(LogLevel::Info, source, message);
    }

    pub fn error(&self, source: &str, message: &str) {
        self.log(LogLevel::Error, source, message);
    }

    /// Show the log window contents
    pub fn show(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Level:");
            egui::ComboBox::from_id_salt("log_level")
                .selected_text(self.min_level.label())
                .show_ui(ui, |ui| {
                    for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
                        ui.selectable_value(&mut self.min_level, level, level.label());
                    }
                });

            ui.separator();
            ui.add(
                egui::TextEdit::singleline(&mut self.filter_text)
                    .desired_width(150.0)
                    .hint_text("Search..."),
            );
            ui.checkbox(&mut self.auto_scroll, "Auto-scroll");
            ui.checkbox(&mut self.show_timestamps, "Timestamps");

            if ui.button("🗑 Clear").clicked() {
                self.log_buffer.write().clear();
            }
        });

        ui.separator();

        let logs = self.log_buffer.read();
        let filter_lower = self.filter_text.to_lowercase();
        let visible: Vec<&LogEntry> = logs
            .iter()
            .filter(|e| e.matches(self.min_level, &filter_lower))
            .collect();

        let row_height = ui.text_style_height(&egui::TextStyle::Monospace);
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .stick_to_bottom(self.auto_scroll)
            .show_rows(ui, row_height, visible.len(), |ui, rows| {
                for entry in rows.filter_map(|row| visible.get(row)) {
                    ui.horizontal(|ui| {
                        ui.label(
                            egui::RichText::new(format!("[{}]", entry.level.label()))
                                .color(entry.level.color())
                                .monospace(),
                        );
                        if self.show_timestamps {
                            let age = entry.timestamp.elapsed().as_secs_f64();
                            ui.label(egui::RichText::new(format!("-{:.1}s", age)).monospace().weak());
                        }
                        ui.label(
                            egui::RichText::new(format!("[{}]", entry.source))
                                .monospace()
                                .color(egui::Color32::LIGHT_GRAY),
                        );
                        ui.label(egui::RichText::new(&entry.message).monospace());
                    });
                }
            });
    }

    /// Paint recent warnings and errors over everything else
    pub fn show_toasts(&self, ctx: &egui::Context) {
        let alerts = recent_alerts(&self.log_buffer.read(), Instant::now());
        if alerts.is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -40.0])
            .order(egui::Order::Foreground)
            .interactable(false)
            .show(ctx, |ui| {
                for alert in &alerts {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.colored_label(alert.level.color(), &alert.message);
                    });
                }
            });

        // repaint again once the oldest toast expires
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

impl Default for LogViewer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_bounded() {
        let buffer = create_log_buffer();
        for i in 0..MAX_LOG_ENTRIES + 10 {
            add_log_entry(&buffer, LogLevel::Debug, "test", &format!("entry {}", i));
        }
        let logs = buffer.read();
        assert_eq!(logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(logs.front().unwrap().message, "entry 10");
    }

    #[test]
    fn test_filter() {
        let buffer = create_log_buffer();
        add_log_entry(&buffer, LogLevel::Info, "storage", "Imported gb.so");
        add_log_entry(&buffer, LogLevel::Debug, "session", "state change");
        let logs = buffer.read();

        assert!(logs[0].matches(LogLevel::Info, ""));
        assert!(logs[0].matches(LogLevel::Info, "storage"));
        assert!(logs[0].matches(LogLevel::Debug, "gb.so"));
        assert!(!logs[0].matches(LogLevel::Warn, ""));
        assert!(!logs[1].matches(LogLevel::Info, ""));
    }

    #[test]
    fn test_toasts_only_show_recent_alerts() {
        let buffer = create_log_buffer();
        add_log_entry(&buffer, LogLevel::Error, "session", "Native call loadCore failed");
        add_log_entry(&buffer, LogLevel::Info, "session", "Emulation started");
        for i in 0..5 {
            add_log_entry(&buffer, LogLevel::Warn, "storage", &format!("warning {}", i));
        }

        let now = Instant::now();
        let alerts = recent_alerts(&buffer.read(), now);
        assert_eq!(alerts.len(), MAX_TOASTS);
        assert_eq!(alerts.last().unwrap().message, "warning 4");

        let later = now + TOAST_DURATION + Duration::from_secs(1);
        assert!(recent_alerts(&buffer.read(), later).is_empty());
    }
}
