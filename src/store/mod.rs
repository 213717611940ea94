use crate::schema::{Message, MessageStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgMessageStore;

/// Persistence contract for outbound messages.
///
/// `claim` is the only operation with cross-worker coordination semantics:
/// it must atomically select up to `limit` pending messages and mark them
/// processing, such that no two concurrent claims (in this or any other
/// process) ever return the same message id. Rows locked by an in-flight
/// claim are skipped, not waited on.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Claim up to `limit` pending messages, transitioning them to
    /// `Processing`. Returns an empty batch when nothing is eligible.
    /// All-or-nothing: a store error leaves no partial claim behind.
    async fn claim(&self, limit: usize) -> anyhow::Result<Vec<Message>>;

    /// Single-row status write with its update timestamp.
    async fn update_status(
        &self,
        id: Uuid,
        status: MessageStatus,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Messages already delivered successfully, oldest first.
    async fn list_delivered(&self) -> anyhow::Result<Vec<Message>>;
}
