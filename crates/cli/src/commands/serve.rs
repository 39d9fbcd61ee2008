//! `carnaticguru serve`: Start the HTTP gateway.

use std::path::Path;

pub async fn run(
    config_path: &Path,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("CarnaticGuru Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Sessions:  {}", config.sessions.backend);

    carnaticguru_gateway::start(config).await?;

    Ok(())
}
