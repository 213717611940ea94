use crate::cache::Cache;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;

pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    /// Connect and verify the server answers, retrying a few times so a
    /// cold deployment can come up before its Redis does.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = Client::open(url)?;

        let mut last_err = None;
        for attempt in 1..=5u32 {
            match client.get_multiplexed_async_connection().await {
                Ok(mut conn) => {
                    let pong: redis::RedisResult<String> =
                        redis::cmd("PING").query_async(&mut conn).await;
                    match pong {
                        Ok(_) => return Ok(Self { conn }),
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(e) => last_err = Some(e),
            }
            tracing::warn!(attempt, "redis not reachable yet, retrying");
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        Err(anyhow::anyhow!(
            "failed to ping redis: {}",
            last_err.expect("at least one attempt ran")
        ))
    }
}

#[async_trait::async_trait]
impl Cache for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }
}
