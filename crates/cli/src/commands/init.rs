//! `carnaticguru init`: First-time setup.

use carnaticguru_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| Path::new(".").to_path_buf(), Path::to_path_buf);

    println!("CarnaticGuru: First-Time Setup");
    println!("===============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("Edit it manually or delete it and re-run init.\n");
    } else {
        std::fs::write(config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
    }

    let config = AppConfig::load_from(config_path)?;
    let document = config.lessons.resolved_document();
    println!("\nNext steps:");
    if !config.has_api_key() {
        println!("  - Set GEMINI_API_KEY (or add api_key to config.toml)");
    }
    if !document.exists() {
        println!(
            "  - Place the extracted lesson text at {}",
            document.display()
        );
    }
    println!("  - Run `carnaticguru chat`");
    Ok(())
}
