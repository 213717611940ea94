use crate::schema::{Message, MessageStatus};
use crate::store::MessageStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-memory store for development and tests. The single mutex gives the
/// same claim exclusivity the Postgres impl gets from row locks, and
/// `update_status` additionally rejects transitions the status machine
/// does not allow.
#[derive(Default)]
pub struct InMemoryStore {
    messages: Mutex<HashMap<Uuid, Message>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_pending(&self, phone_number: &str, content: &str) -> Uuid {
        let id = Uuid::new_v4();
        let msg = Message {
            id,
            phone_number: phone_number.to_string(),
            content: content.to_string(),
            status: MessageStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.messages.lock().await.insert(id, msg);
        id
    }

    pub async fn status_of(&self, id: Uuid) -> Option<MessageStatus> {
        self.messages.lock().await.get(&id).map(|m| m.status)
    }

    pub async fn count_with_status(&self, status: MessageStatus) -> usize {
        self.messages
            .lock()
            .await
            .values()
            .filter(|m| m.status == status)
            .count()
    }
}

#[async_trait::async_trait]
impl MessageStore for InMemoryStore {
    async fn claim(&self, limit: usize) -> anyhow::Result<Vec<Message>> {
        let mut messages = self.messages.lock().await;

        let mut eligible: Vec<(DateTime<Utc>, Uuid)> = messages
            .values()
            .filter(|m| m.status == MessageStatus::Pending)
            .map(|m| (m.created_at, m.id))
            .collect();
        eligible.sort();
        eligible.truncate(limit);

        let mut claimed = Vec::with_capacity(eligible.len());
        for (_, id) in eligible {
            let msg = messages.get_mut(&id).expect("id came from the map");
            msg.status = MessageStatus::Processing;
            msg.updated_at = Some(Utc::now());
            claimed.push(msg.clone());
        }
        Ok(claimed)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: MessageStatus,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut messages = self.messages.lock().await;
        let msg = messages
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown message: {id}"))?;
        if !msg.status.can_transition_to(status) {
            anyhow::bail!(
                "illegal status transition for {id}: {} -> {}",
                msg.status.as_str(),
                status.as_str()
            );
        }
        msg.status = status;
        msg.updated_at = Some(updated_at);
        Ok(())
    }

    async fn list_delivered(&self) -> anyhow::Result<Vec<Message>> {
        let messages = self.messages.lock().await;
        let mut delivered: Vec<Message> = messages
            .values()
            .filter(|m| m.status == MessageStatus::Success)
            .cloned()
            .collect();
        delivered.sort_by_key(|m| m.created_at);
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn claim_marks_messages_processing() {
        let store = InMemoryStore::new();
        let id = store.insert_pending("+15550001111", "hi").await;

        let batch = store.claim(10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].status, MessageStatus::Processing);
        assert_eq!(store.status_of(id).await, Some(MessageStatus::Processing));
    }

    #[tokio::test]
    async fn claim_returns_empty_batch_when_nothing_pending() {
        let store = InMemoryStore::new();
        assert!(store.claim(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn claim_respects_limit() {
        let store = InMemoryStore::new();
        for n in 0..5 {
            store.insert_pending("+15550001111", &format!("m{n}")).await;
        }
        assert_eq!(store.claim(3).await.unwrap().len(), 3);
        assert_eq!(store.claim(3).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_messages_are_not_reclaimed() {
        let store = InMemoryStore::new();
        let id = store.insert_pending("+15550001111", "hi").await;
        store.claim(1).await.unwrap();
        store
            .update_status(id, MessageStatus::Failed, Utc::now())
            .await
            .unwrap();

        assert!(store.claim(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_claims_never_overlap() {
        let store = Arc::new(InMemoryStore::new());
        for n in 0..40 {
            store.insert_pending("+15550001111", &format!("m{n}")).await;
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.claim(7).await.unwrap() }));
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for msg in handle.await.unwrap() {
                assert!(seen.insert(msg.id), "message claimed twice: {}", msg.id);
                total += 1;
            }
        }
        assert_eq!(total, 40);
    }

    #[tokio::test]
    async fn rejects_updates_out_of_terminal_states() {
        let store = InMemoryStore::new();
        let id = store.insert_pending("+15550001111", "hi").await;
        store.claim(1).await.unwrap();
        store
            .update_status(id, MessageStatus::Success, Utc::now())
            .await
            .unwrap();

        let err = store
            .update_status(id, MessageStatus::Failed, Utc::now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("illegal status transition"));
    }
}
