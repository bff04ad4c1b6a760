use energy_monitor_api::repositories::{InMemorySampleStore, PgSampleRepository, SampleStore};
use energy_monitor_api::{api, db, Config};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting energy-monitor-api");

    let cfg_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!(
        rate = cfg.pricing.rate,
        currency = %cfg.pricing.currency,
        "Configuration loaded"
    );

    let store: Arc<dyn SampleStore> = match &cfg.database {
        Some(db_cfg) => {
            let pool = db::connect(db_cfg).await?;
            db::ensure_schema(&pool).await?;
            info!("Connected to database");
            Arc::new(PgSampleRepository::new(pool))
        }
        None => {
            warn!("No database configured, readings are kept in memory only");
            Arc::new(InMemorySampleStore::new())
        }
    };

    let state = api::AppState::new(store, &cfg)?;
    let router = api::create_router(state);
    let addr = format!("{}:{}", cfg.api.host, cfg.api.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("API server listening on {}", addr);

    let serve = axum::serve(listener, router);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    if let Err(e) = serve.with_graceful_shutdown(shutdown).await {
        tracing::error!(error = %e, "API server error");
    }

    info!("Application shutdown complete");
    Ok(())
}
