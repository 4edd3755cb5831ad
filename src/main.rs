use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use lariat::api::{self, handlers::AppState};
use lariat::blacklist::BlacklistService;
use lariat::config::{Config, DatabaseBackend};
use lariat::links::LinkService;
use lariat::redirect::{self, RedirectState};
use lariat::stats::StatsService;
use lariat::storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    let blacklist = Arc::new(BlacklistService::new(
        Arc::clone(&storage),
        Duration::from_secs(config.blacklist_cache_ttl_secs),
        config.blacklist_cache_capacity,
    ));
    let links = Arc::new(LinkService::new(
        Arc::clone(&storage),
        Arc::clone(&blacklist),
    ));
    let stats = Arc::new(StatsService::new(Arc::clone(&storage)));

    // Expiry sweep: deletes on the same path a user-initiated delete takes,
    // minus authorization, since its precondition is time alone.
    let sweep_storage = Arc::clone(&storage);
    let sweep_interval = config.expiry_sweep_interval_secs;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_interval));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp();
            match sweep_storage.delete_expired(now).await {
                Ok(slugs) if !slugs.is_empty() => {
                    info!(count = slugs.len(), "expiry sweep removed links: {slugs:?}");
                }
                Ok(_) => {}
                Err(err) => warn!("expiry sweep failed: {err:#}"),
            }
        }
    });

    let api_state = Arc::new(AppState {
        links: Arc::clone(&links),
        stats,
        blacklist,
    });
    let api_router = api::create_api_router(api_state);
    let redirect_router = redirect::create_redirect_router(Arc::new(RedirectState { links }));

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("API server listening on http://{}", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("Redirect server listening on http://{}", redirect_addr);

    tokio::try_join!(
        axum::serve(api_listener, api_router),
        axum::serve(redirect_listener, redirect_router),
    )?;

    Ok(())
}
