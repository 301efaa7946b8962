// msgrelay server binary

use anyhow::{Context, Result};
use msgrelay::{RelayCli, RelayServer, SqliteStore};
use tokio::task::LocalSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "msgrelay=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = RelayCli::parse_args();
    let addr = cli.listen_addr()?;

    let store = SqliteStore::open(&cli.database)
        .with_context(|| format!("Failed to open database {:?}", cli.database))?;

    let server = RelayServer::bind(addr, store)?;

    LocalSet::new()
        .run_until(server.run(shutdown_signal()))
        .await?;

    tracing::info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
