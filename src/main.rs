use messenger_store::config::{PollConfig, StorageConfig};
use messenger_store::store::init_db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = StorageConfig::from_env()?;
    let poll = PollConfig::from_env()?;

    eprintln!("📦 Messenger store v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    match &config.kv_dir {
        Some(dir) => eprintln!("   Fallback slots: {}", dir.display()),
        None => eprintln!("   Fallback slots: in memory"),
    }

    let store = init_db(&config).await;
    eprintln!("   Backend: {}", store.backend_kind());
    eprintln!("   Chat poll interval: {}ms", poll.interval.as_millis());

    let users = store.get_all_users(None).await?;
    let mut messages = 0;
    for (i, a) in users.iter().enumerate() {
        for b in &users[i..] {
            messages += store.get_conversation(a.id, b.id).await?.len();
        }
    }
    eprintln!("   Users: {}", users.len());
    eprintln!("   Messages between users: {}", messages);

    store.close().await?;
    Ok(())
}
