//! `carnaticguru users`: List configured learners.

use std::path::Path;

pub fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let directory = config.user_directory();

    println!("{:<12} {:<10} {:<6} COLOR", "ID", "NAME", "");
    for user in directory.all() {
        println!(
            "{:<12} {:<10} {:<6} {}",
            user.id, user.name, user.avatar, user.color
        );
    }
    Ok(())
}
