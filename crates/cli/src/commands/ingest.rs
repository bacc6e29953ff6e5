//! `paperchat ingest` — Add a document to a collection.

use std::path::Path;

use paperchat_config::AppConfig;
use paperchat_gateway::AppState;

pub async fn run(
    config: &AppConfig,
    file: &Path,
    collection: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let state = AppState::from_config(config).await?;
    let report = state.ingestor.ingest(&filename, bytes, collection).await?;

    println!("✅ Ingested {filename}");
    println!("   Collection: {}", report.collection);
    println!("   New chunks: {}", report.chunks);
    println!("   Total:      {}", report.total_chunks);
    if report.created {
        println!("   (collection created)");
    }

    Ok(())
}
