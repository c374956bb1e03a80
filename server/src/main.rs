//! kartvizit HTTP server.
//!
//! Run from repo root: `cargo run -p kartvizit-server`
//! Pass `--seed` to insert demo data into an empty store.

use kartvizit::{app_router, seed, AppState, MemoryRepository, PgRepository, Repository, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kartvizit=info,kartvizit_server=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let repo: Arc<dyn Repository> = if settings.database.url.is_some() {
        let repo = PgRepository::connect(&settings.database).await?;
        tracing::info!(schema = %settings.database.schema, "using postgres repository");
        Arc::new(repo)
    } else {
        tracing::warn!("DATABASE_URL not set; data lives in memory and is lost on exit");
        Arc::new(MemoryRepository::new())
    };

    if std::env::args().any(|a| a == "--seed") {
        if seed(repo.as_ref()).await? {
            tracing::info!("demo data inserted");
        } else {
            tracing::info!("store not empty; seed skipped");
        }
    }

    let bind_addr = settings.bind_addr.clone();
    let state = AppState::from_settings(settings, repo).await?;
    let app = app_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("kartvizit listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
