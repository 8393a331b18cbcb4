use std::sync::Arc;

use anyhow::Context;
use campus_portal::{
    app,
    config::Config,
    identity::{FirebaseIdentity, Identity, LocalIdentity},
    store::{self, BlobStore},
    AppState,
};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,campus_portal=debug")))
        .with(fmt::layer())
        .init();

    let config = Config::from_env()?;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_minutes)));

    let db_pool = store::connect(&config.database_url).await?;

    let identity: Identity = match &config.firebase_api_key {
        Some(key) => {
            tracing::info!("using firebase identity provider");
            Arc::new(FirebaseIdentity::new(key.clone(), config.http_timeout)?)
        },
        None => {
            tracing::warn!("FIREBASE_API_KEY not set, using local credentials");
            Arc::new(LocalIdentity::new(db_pool.clone()))
        },
    };

    tokio::fs::create_dir_all(&config.blob_dir)
        .await
        .with_context(|| format!("could not create {}", config.blob_dir.display()))?;
    let blobs = BlobStore::new(config.blob_dir.clone());

    let state = AppState::new(db_pool, identity, blobs, config.ledger);
    let app = app(state).layer(session_layer);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("could not bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, ledger = ?config.ledger, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
