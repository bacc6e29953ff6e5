//! `paperchat collections` — Vector collection management.

use paperchat_config::AppConfig;
use paperchat_gateway::AppState;
use paperchat_index::CollectionName;

pub async fn list(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::from_config(config).await?;
    let collections = state.index().list().await?;

    if collections.is_empty() {
        println!("No collections. Run `paperchat ingest <FILE>` first.");
        return Ok(());
    }

    println!("📚 Collections in {}", state.index().root().display());
    for c in &collections {
        println!("  {:<24} {:>6} chunks  dim {}", c.name, c.chunks, c.dimension);
    }
    Ok(())
}

pub async fn delete(config: &AppConfig, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::from_config(config).await?;
    let collection = CollectionName::parse(name)?;

    if state.index().delete(&collection).await? {
        println!("✅ Deleted collection '{collection}'");
        Ok(())
    } else {
        Err(format!("Collection '{collection}' not found").into())
    }
}
