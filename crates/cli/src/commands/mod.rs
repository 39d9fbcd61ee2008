pub mod chat;
pub mod history;
pub mod init;
pub mod serve;
pub mod users;

use carnaticguru_config::AppConfig;
use std::path::Path;

/// Load the config at `path` with environment overrides applied.
pub fn load_config(path: &Path) -> Result<AppConfig, String> {
    AppConfig::load_with_env(path).map_err(|e| format!("Failed to load config: {e}"))
}
