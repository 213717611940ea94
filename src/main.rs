use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use herald::cache::RedisCache;
use herald::clock::{Clock, SystemClock};
use herald::config::Config;
use herald::http;
use herald::sender::{
    Dispatcher, ExponentialBackoff, IdempotencyRecorder, SenderService, WebhookClient,
};
use herald::store::{MessageStore, PgMessageStore};

async fn connect_postgres(url: &str) -> anyhow::Result<PgPool> {
    let mut last_err = None;
    for attempt in 1..=5u32 {
        match PgPoolOptions::new().max_connections(5).connect(url).await {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "postgres not reachable yet, retrying");
                last_err = Some(e);
            }
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Err(anyhow::anyhow!(
        "failed to connect to postgres: {}",
        last_err.expect("at least one attempt ran")
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let pool = connect_postgres(&config.database_url).await?;
    let pg_store = PgMessageStore::new(pool);
    pg_store.migrate().await?;
    pg_store.seed_if_empty().await?;
    let store: Arc<dyn MessageStore> = Arc::new(pg_store);

    let cache = Arc::new(RedisCache::connect(&config.redis_url).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        Arc::new(WebhookClient::new(config.webhook_url.clone())),
        Arc::new(ExponentialBackoff::new(config.max_attempts)),
        Arc::new(IdempotencyRecorder::new(cache, clock.clone())),
        clock,
        config.concurrency,
    ));
    let sender = Arc::new(SenderService::new(
        dispatcher,
        store,
        config.batch_size,
        config.send_interval,
    ));

    // sending begins on boot; the control surface can pause/resume it
    sender.start().await;

    let app = http::router(sender.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    tracing::info!(port = config.http_port, "control api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    sender.stop().await;
    Ok(())
}
