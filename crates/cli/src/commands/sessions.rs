//! `paperchat sessions` — Conversation history management.

use paperchat_config::AppConfig;
use paperchat_core::SessionId;
use paperchat_memory::ConversationMemory;

async fn open(config: &AppConfig) -> Result<ConversationMemory, Box<dyn std::error::Error>> {
    let backend = paperchat_memory::connect(&config.history_url()).await?;
    Ok(ConversationMemory::new(backend)
        .with_preview_chars(config.history.preview_chars)
        .with_timeout(config.timeouts.storage()))
}

pub async fn list(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let memory = open(config).await?;
    let sessions = memory.list_all().await?;

    if sessions.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }

    println!("💬 Sessions ({})", sessions.len());
    for s in &sessions {
        println!(
            "  {}  {:>3} msgs  {}  {}",
            s.session_id,
            s.message_count,
            s.updated_at.format("%Y-%m-%d %H:%M"),
            s.preview
        );
    }
    Ok(())
}

pub async fn show(config: &AppConfig, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let memory = open(config).await?;
    let messages = memory.history(&SessionId::from(id)).await?;

    if messages.is_empty() {
        println!("Session '{id}' has no messages.");
        return Ok(());
    }

    for message in &messages {
        println!("[{}] {}", message.role.as_str(), message.content);
    }
    Ok(())
}

pub async fn clear(config: &AppConfig, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let memory = open(config).await?;
    if memory.clear(&SessionId::from(id)).await? {
        println!("✅ Session history cleared");
        Ok(())
    } else {
        Err("Session not found".into())
    }
}
