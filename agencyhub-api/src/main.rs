//! # Agencyhub API Server
//!
//! Multi-tenant REST API for creative and digital agencies.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/agencyhub \
//! JWT_SECRET=change-me-to-at-least-32-bytes-of-entropy \
//! cargo run -p agencyhub-api
//! ```
//!
//! Set `LOG_FORMAT=json` for one JSON object per log line.

use agencyhub_api::{
    app::{build_router, AppState},
    config::Config,
};
use agencyhub_shared::{
    auth::google::HttpGoogleVerifier,
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool},
    },
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Agencyhub API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(config.database.pool_config()).await?;
    run_migrations(&pool).await?;

    let mut state = AppState::new(pool.clone(), config.clone());
    match config.google.client_id.as_deref() {
        Some(client_id) => {
            let verifier = HttpGoogleVerifier::new(client_id, config.google.tokeninfo_url.as_str())?;
            state = state.with_google_verifier(Arc::new(verifier));
            tracing::info!("Google sign-in enabled");
        }
        None => tracing::info!("GOOGLE_CLIENT_ID not set, Google sign-in disabled"),
    }

    let app = build_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, production = config.api.production, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "agencyhub_api=debug,agencyhub_shared=info,tower_http=info".into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
