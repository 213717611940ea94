use crate::schema::Message;
use crate::sender::dispatcher::Dispatcher;
use crate::store::MessageStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Lifecycle of the sending loop. The two variants are the whole state
/// machine; start and stop are its only transitions, serialized by the
/// mutex in `SenderService`.
enum Lifecycle {
    Stopped,
    Running { cancel: CancellationToken },
}

/// Drives periodic delivery cycles and owns start/stop.
///
/// One long-lived task runs the loop; the cycle executes inline between
/// ticks, so cycles never overlap and a tick that fires mid-cycle is
/// skipped. The first cycle runs immediately on start rather than after a
/// full interval.
pub struct SenderService {
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn MessageStore>,
    batch_size: usize,
    send_interval: Duration,
    state: Mutex<Lifecycle>,
}

impl SenderService {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn MessageStore>,
        batch_size: usize,
        send_interval: Duration,
    ) -> Self {
        Self {
            dispatcher,
            store,
            batch_size,
            send_interval,
            state: Mutex::new(Lifecycle::Stopped),
        }
    }

    /// Begin periodic sending. No-op when already running.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, Lifecycle::Running { .. }) {
            tracing::debug!("sender already running");
            return;
        }

        let cancel = CancellationToken::new();
        tokio::spawn(run_loop(
            self.dispatcher.clone(),
            self.batch_size,
            self.send_interval,
            cancel.clone(),
        ));
        *state = Lifecycle::Running { cancel };
        tracing::info!(
            batch_size = self.batch_size,
            interval_ms = self.send_interval.as_millis() as u64,
            "sender started"
        );
    }

    /// Stop the loop and cancel the in-flight cycle's scope. Attempts past
    /// their network call finish; unsent attempts are abandoned. No-op
    /// when already stopped.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        match &*state {
            Lifecycle::Stopped => {
                tracing::debug!("sender already stopped");
            }
            Lifecycle::Running { cancel } => {
                cancel.cancel();
                *state = Lifecycle::Stopped;
                tracing::info!("sender stopped");
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, Lifecycle::Running { .. })
    }

    pub async fn list_delivered(&self) -> anyhow::Result<Vec<Message>> {
        self.store.list_delivered().await
    }
}

async fn run_loop(
    dispatcher: Arc<Dispatcher>,
    batch_size: usize,
    send_interval: Duration,
    cancel: CancellationToken,
) {
    // The first tick completes immediately; missed ticks are coalesced
    // because the cycle runs inline here.
    let mut ticker = tokio::time::interval(send_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match dispatcher.clone().run_cycle(batch_size, &cancel).await {
                    Ok(n) if n > 0 => tracing::info!(processed = n, "delivery cycle"),
                    Err(e) => tracing::error!(error = %e, "delivery cycle failed"),
                    _ => {}
                }
            }
        }
    }
    tracing::debug!("sender loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::clock::{Clock, SystemClock};
    use crate::schema::MessageStatus;
    use crate::sender::client::WebhookClient;
    use crate::sender::recorder::IdempotencyRecorder;
    use crate::sender::retry::ExponentialBackoff;
    use crate::sender::testutil::MockWebhook;
    use crate::store::InMemoryStore;

    async fn service(webhook_url: String, store: Arc<InMemoryStore>) -> SenderService {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = Arc::new(InMemoryCache::new(clock.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            Arc::new(WebhookClient::new(webhook_url)),
            Arc::new(ExponentialBackoff {
                base_delay: Duration::from_millis(1),
                multiplier: 1.0,
                max_attempts: Some(3),
            }),
            Arc::new(IdempotencyRecorder::new(cache, clock.clone())),
            clock,
            4,
        ));
        SenderService::new(dispatcher, store, 10, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn stop_before_start_is_a_noop() {
        let webhook = MockWebhook::spawn().await;
        let store = Arc::new(InMemoryStore::new());
        let sender = service(webhook.url.clone(), store).await;

        sender.stop().await;
        assert!(!sender.is_running().await);
    }

    #[tokio::test]
    async fn double_start_is_a_noop() {
        let webhook = MockWebhook::spawn().await;
        let store = Arc::new(InMemoryStore::new());
        let sender = service(webhook.url.clone(), store).await;

        sender.start().await;
        sender.start().await;
        assert!(sender.is_running().await);
        sender.stop().await;
        assert!(!sender.is_running().await);
    }

    #[tokio::test]
    async fn first_cycle_runs_without_waiting_for_the_interval() {
        let webhook = MockWebhook::spawn().await;
        let store = Arc::new(InMemoryStore::new());
        let id = store.insert_pending("+100", "hi").await;
        // interval is an hour; only the immediate first cycle can deliver
        let sender = service(webhook.url.clone(), store.clone()).await;

        sender.start().await;
        for _ in 0..100 {
            if store.status_of(id).await == Some(MessageStatus::Success) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sender.stop().await;

        assert_eq!(store.status_of(id).await, Some(MessageStatus::Success));
    }

    #[tokio::test]
    async fn restart_after_stop_picks_up_new_messages() {
        let webhook = MockWebhook::spawn().await;
        let store = Arc::new(InMemoryStore::new());
        let sender = service(webhook.url.clone(), store.clone()).await;

        sender.start().await;
        sender.stop().await;

        let id = store.insert_pending("+100", "hi").await;
        sender.start().await;
        for _ in 0..100 {
            if store.status_of(id).await == Some(MessageStatus::Success) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sender.stop().await;

        assert_eq!(store.status_of(id).await, Some(MessageStatus::Success));
        assert_eq!(sender.list_delivered().await.unwrap().len(), 1);
    }
}
