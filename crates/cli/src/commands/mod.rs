pub mod agent;
pub mod bot;
pub mod gateway;
pub mod status;
pub mod tools;

use toolrelay_config::{AppConfig, ConfigError};

/// Load configuration, turning failures into a printable message.
pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

/// Explain a missing required value and where to set it.
pub(crate) fn report_config_error(error: &ConfigError) {
    eprintln!();
    eprintln!("  ❌ {error}");
    if let ConfigError::MissingValue { name, .. } = error {
        eprintln!();
        eprintln!("  Set {name} in your environment or in a .env file, or add it to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    }
    eprintln!();
}
