use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub webhook_url: String,
    pub http_port: u16,
    pub batch_size: usize,
    pub send_interval: Duration,
    /// `None` means retry without a cap.
    pub max_attempts: Option<u32>,
    pub concurrency: usize,
}

fn env_required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("missing required env var {key}"))
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let batch_size = env_parse("HERALD_BATCH_SIZE", 2usize);
        let max_attempts = match env_parse("HERALD_MAX_ATTEMPTS", 3u32) {
            0 => None,
            n => Some(n),
        };

        Ok(Self {
            database_url: env_required("HERALD_DATABASE_URL")?,
            redis_url: env_required("HERALD_REDIS_URL")?,
            webhook_url: env_required("HERALD_WEBHOOK_URL")?,
            http_port: env_parse("HERALD_HTTP_PORT", 6060u16),
            batch_size,
            send_interval: Duration::from_millis(env_parse(
                "HERALD_SEND_INTERVAL_MS",
                120_000u64,
            )),
            max_attempts,
            concurrency: env_parse("HERALD_CONCURRENCY", batch_size),
        })
    }
}
