// Configuration loading

pub mod logging;
pub mod settings;

pub use settings::{load_settings, save_settings, settings_path, ConfigError, Settings};
