//! `paperchat ask` — One conversational turn from the terminal.

use paperchat_chain::ChatRequest;
use paperchat_config::AppConfig;
use paperchat_core::SessionId;
use paperchat_gateway::AppState;

pub async fn run(
    config: &AppConfig,
    query: String,
    session: Option<String>,
    collection: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::from_config(config).await?;

    let mut request = ChatRequest::new(query);
    if let Some(session) = session {
        request = request.with_session(SessionId(session));
    }
    if let Some(collection) = collection {
        request = request.with_collection(collection);
    }

    let outcome = state.chain.run(request).await?;

    println!("{}", outcome.answer);
    println!();
    if !outcome.sources.is_empty() {
        println!("Sources:");
        for (i, hit) in outcome.sources.iter().enumerate() {
            match hit.chunk.metadata.page {
                Some(page) => println!(
                    "  [{}] {} p.{page} (score {:.3})",
                    i + 1,
                    hit.chunk.metadata.source,
                    hit.score
                ),
                None => println!("  [{}] {} (score {:.3})", i + 1, hit.chunk.metadata.source, hit.score),
            }
        }
    }
    if let Some(warning) = &outcome.persistence_warning {
        eprintln!("⚠️  {warning}");
    }
    println!("Session: {}", outcome.session_id);

    Ok(())
}
