//! `carnaticguru chat`: Interactive or single-message tutoring.

use super::history::print_session;
use carnaticguru_agent::{QueryReply, QueryRequest, TurnStatus, default_session_id};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: &Path,
    user: String,
    session: Option<String>,
    message: Option<String>,
    category: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let users = config.user_directory();
    let Some(profile) = users.get(&user) else {
        return Err(format!("Unknown user '{user}'. Run `carnaticguru users` to list learners.").into());
    };

    // Lessons work offline; only raga answers and patterns need the model.
    if !config.has_api_key() {
        eprintln!("  Note: no API key configured. Raga questions and patterns will fail.");
        eprintln!(
            "  Set GEMINI_API_KEY or edit {}",
            config_path.display()
        );
    }

    let orchestrator = carnaticguru_agent::build_from_config(&config).await?;
    let session_id = session.unwrap_or_else(|| default_session_id(&user));
    let request = |query: String| {
        let mut request = QueryRequest::new(&user, query).with_session(&session_id);
        if let Some(category) = &category {
            request = request.with_category(category);
        }
        request
    };

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let reply = orchestrator.handle(request(msg)).await;
        eprint!("\r              \r");
        print_reply(&reply);
        return Ok(());
    }

    println!();
    println!("  CarnaticGuru: {} {}", profile.avatar, profile.name);
    println!("  Session: {session_id}");
    println!("  Provider: {} ({})", config.default_provider, config.default_model);
    println!();
    println!("  Ask for a lesson, a raga, or practice patterns.");
    println!("  Type 'history' to replay this session, 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "exit" | "quit" => break,
            "history" => match orchestrator.history(&user, Some(session_id.as_str())).await? {
                Some(session) => print_session(&session),
                None => println!("  (no messages yet)"),
            },
            query => {
                let reply = orchestrator.handle(request(query.to_string())).await;
                print_reply(&reply);
            }
        }
        prompt()?;
    }
    println!("  Goodbye.");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_reply(reply: &QueryReply) {
    println!("  {}:", reply.agent_name);
    for line in reply.response.lines() {
        println!("    {line}");
    }
    if reply.status != TurnStatus::Answered {
        tracing::debug!(status = ?reply.status, "Turn not answered");
    }
    println!();
}
