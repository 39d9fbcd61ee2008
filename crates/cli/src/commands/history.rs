//! `carnaticguru history`: Print a stored session.

use carnaticguru_agent::default_session_id;
use carnaticguru_core::session::{Session, SessionKey};
use std::path::Path;

pub async fn run(
    config_path: &Path,
    user: String,
    session: Option<String>,
    list: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = carnaticguru_agent::open_session_store(&config).await?;

    if list {
        let sessions = store.list_sessions(&config.app_name, &user).await?;
        if sessions.is_empty() {
            println!("No sessions for {user}.");
        }
        for summary in sessions {
            println!(
                "  {:<24} {:>4} events   updated {}",
                summary.key.session_id,
                summary.event_count,
                summary.updated_at.format("%Y-%m-%d %H:%M")
            );
        }
        return Ok(());
    }

    let session_id = session.unwrap_or_else(|| default_session_id(&user));
    let key = SessionKey::new(&config.app_name, &user, &session_id);
    match store.get_session(&key).await? {
        Some(session) => print_session(&session),
        None => println!("No session '{session_id}' for {user}."),
    }
    Ok(())
}

pub fn print_session(session: &Session) {
    for event in &session.events {
        println!(
            "  [{}] {} {}:",
            event.position,
            event.timestamp.format("%H:%M:%S"),
            event.author
        );
        for line in event.content.as_deref().unwrap_or("").lines() {
            println!("      {line}");
        }
    }
}
