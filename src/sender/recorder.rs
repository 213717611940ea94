use crate::cache::Cache;
use crate::clock::Clock;
use std::sync::Arc;
use std::time::Duration;

const KEY_PREFIX: &str = "sent_msg:";
const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Writes a short-lived marker for every confirmed delivery, keyed by the
/// external system's message id, so downstream consumers can detect
/// duplicates. Write-only from the sender's perspective; entries expire
/// via TTL and are never deleted explicitly.
pub struct IdempotencyRecorder {
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
}

impl IdempotencyRecorder {
    pub fn new(cache: Arc<dyn Cache>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }

    pub async fn record(&self, external_id: &str) -> anyhow::Result<()> {
        let key = format!("{KEY_PREFIX}{external_id}");
        let value = serde_json::json!({
            "messageId": external_id,
            "sentAt": self.clock.now().to_rfc3339(),
        });
        self.cache.set(&key, &value.to_string(), RETENTION).await
    }
}
