//! `paperchat serve` — Start the HTTP API server.

use paperchat_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() {
        eprintln!("  ⚠️  No API key configured; /chat and /upload will fail until one is set.");
    }

    println!("📄 PaperChat API");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:      {} ({})", config.default_model, config.default_provider);
    println!("   Indexes:    {}", config.index_root().display());

    paperchat_gateway::start(config).await?;

    Ok(())
}
