use crate::clock::Clock;
use crate::schema::{DeliveryOutcome, Message, MessageStatus};
use crate::sender::client::WebhookClient;
use crate::sender::recorder::IdempotencyRecorder;
use crate::sender::retry::RetryPolicy;
use crate::store::MessageStore;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Fans a claimed batch out into concurrent per-message delivery tasks and
/// joins on all of them. Messages are independent once claimed: one
/// message's failure never aborts or delays its siblings, and each message
/// gets exactly one terminal status write no matter how many attempts ran.
pub struct Dispatcher {
    store: Arc<dyn MessageStore>,
    client: Arc<WebhookClient>,
    retry: Arc<dyn RetryPolicy>,
    recorder: Arc<IdempotencyRecorder>,
    clock: Arc<dyn Clock>,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn MessageStore>,
        client: Arc<WebhookClient>,
        retry: Arc<dyn RetryPolicy>,
        recorder: Arc<IdempotencyRecorder>,
        clock: Arc<dyn Clock>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            client,
            retry,
            recorder,
            clock,
            concurrency: concurrency.max(1),
        }
    }

    /// Claim up to `batch_size` messages and deliver them. Returns the
    /// number of messages in the batch; a claim error aborts the cycle
    /// with no partial side effects.
    pub async fn run_cycle(
        self: Arc<Self>,
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> anyhow::Result<usize> {
        let batch = self.store.claim(batch_size).await?;
        if batch.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = batch.len(), "dispatching claimed batch");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let count = batch.len();

        for msg in batch {
            let dispatcher = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                dispatcher.deliver_with_retry(msg, cancel).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "delivery task panicked");
            }
        }

        Ok(count)
    }

    async fn deliver_with_retry(&self, msg: Message, cancel: CancellationToken) {
        let mut attempt: u32 = 1;
        loop {
            // Cancellation is only observed between attempts; a request
            // already sent runs to completion. An abandoned message stays
            // in processing until an operator intervenes.
            if cancel.is_cancelled() {
                tracing::warn!(message_id = %msg.id, "delivery abandoned by shutdown");
                return;
            }

            let request_id = Uuid::new_v4();
            match self.client.deliver(&msg, request_id).await {
                DeliveryOutcome::Delivered { external_id } => {
                    tracing::info!(
                        message_id = %msg.id,
                        attempt,
                        request_id = %request_id,
                        "message delivered"
                    );
                    if let Err(e) = self
                        .store
                        .update_status(msg.id, MessageStatus::Success, self.clock.now())
                        .await
                    {
                        tracing::error!(message_id = %msg.id, error = %e, "failed to mark message success");
                    }
                    if let Some(external_id) = external_id {
                        // a recording failure never reverts the success
                        if let Err(e) = self.recorder.record(&external_id).await {
                            tracing::error!(
                                message_id = %msg.id,
                                external_id = %external_id,
                                error = %e,
                                "failed to record delivery"
                            );
                        }
                    }
                    return;
                }
                DeliveryOutcome::Terminal => {
                    tracing::error!(
                        message_id = %msg.id,
                        attempt,
                        request_id = %request_id,
                        "delivery rejected by endpoint, not retrying"
                    );
                    self.mark_failed(&msg).await;
                    return;
                }
                DeliveryOutcome::Retryable => {
                    tracing::warn!(
                        message_id = %msg.id,
                        attempt,
                        request_id = %request_id,
                        "delivery attempt failed"
                    );
                    match self.retry.next_attempt(attempt) {
                        Some(delay) => {
                            tokio::select! {
                                _ = cancel.cancelled() => {
                                    tracing::warn!(message_id = %msg.id, "delivery abandoned by shutdown");
                                    return;
                                }
                                _ = self.clock.sleep(delay) => {}
                            }
                            attempt += 1;
                        }
                        None => {
                            tracing::error!(message_id = %msg.id, attempts = attempt, "retry budget exhausted");
                            self.mark_failed(&msg).await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn mark_failed(&self, msg: &Message) {
        if let Err(e) = self
            .store
            .update_status(msg.id, MessageStatus::Failed, self.clock.now())
            .await
        {
            tracing::error!(message_id = %msg.id, error = %e, "failed to mark message failed");
        }
    }
}
