use anyhow::anyhow;
use tokio::net::TcpListener;
use tracing::info;

use voxflow::{AppState, ServerConfig, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voxflow=info,tower_http=info".into()),
        )
        .init();

    // TLS to the speech providers needs a crypto provider installed first
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let config = ServerConfig::from_env()?;
    let address = config.address();
    let state = AppState::new(config);

    let app = routes::create_router().with_state(state);

    let listener = TcpListener::bind(&address).await?;
    info!("Voice pipeline server listening on {address}");
    axum::serve(listener, app).await?;

    Ok(())
}
