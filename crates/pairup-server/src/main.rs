mod config;
mod venue_sweep;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use pairup_api::AppStateInner;
use pairup_db::SqliteStore;
use pairup_engine::Engine;
use pairup_engine::venue::{HttpVenueRecommender, NoopRecommender, VenueRecommender};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pairup=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init database
    let store = Arc::new(SqliteStore::open(&config.db_path)?);

    let recommender: Arc<dyn VenueRecommender> = match &config.venue_url {
        Some(url) => {
            info!("Venue suggestions via {}", url);
            Arc::new(HttpVenueRecommender::new(url.clone(), config.engine.venue_timeout)?)
        }
        None => {
            warn!("PAIRUP_VENUE_URL not set, venue suggestions disabled");
            Arc::new(NoopRecommender)
        }
    };

    info!(
        "Engine: min score {}, epoch policy {:?}, cache ttl {}s",
        config.engine.min_score,
        config.engine.epoch_policy,
        config.engine.cache_ttl.as_secs()
    );
    let engine = Arc::new(Engine::new(store.clone(), store, recommender, config.engine.clone()));

    if config.venue_url.is_some() {
        tokio::spawn(venue_sweep::run_venue_sweep(engine.clone(), config.venue_retry_interval));
    }

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(false);

    let app = pairup_api::router(AppStateInner::new(engine, config.jwt_secret))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Pairup server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
