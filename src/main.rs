//! saasemu - libretro core host
//!
//! Main entry point for the application.

use se_core::Config;

fn main() -> anyhow::Result<()> {
    let (config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e.to_string())),
    };

    se_core::logging::init(config.debug.log_level);

    if let Some(e) = load_error {
        tracing::warn!("Using default configuration: {}", e);
    }
    tracing::info!("Starting saasemu");

    se_ui::app::run(config)
}
