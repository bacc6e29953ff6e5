//! `paperchat onboard` — First-time setup.

use std::path::Path;

use paperchat_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_dir().join("config.toml"),
    };
    let defaults = AppConfig::default();

    println!("📄 PaperChat — First-Time Setup");
    println!("===============================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    let index_root = defaults.index_root();
    if !index_root.exists() {
        std::fs::create_dir_all(&index_root)?;
        println!("✅ Created index directory: {}", index_root.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set PAPERCHAT_API_KEY (or OPENAI_API_KEY / GOOGLE_API_KEY)");
    println!("   2. Run: paperchat ingest paper.pdf");
    println!("   3. Run: paperchat ask \"What is this paper about?\"\n");

    Ok(())
}
