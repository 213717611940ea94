use crate::schema::{Message, MessageStatus};
use crate::store::MessageStore;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PgMessageStore {
    pool: PgPool,
}

fn message_from_row(row: &PgRow) -> anyhow::Result<Message> {
    let status: String = row.try_get("status")?;
    Ok(Message {
        id: row.try_get("id")?,
        phone_number: row.try_get("phone_number")?,
        content: row.try_get("content")?,
        status: MessageStatus::parse(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                phone_number varchar(20) NOT NULL,
                content varchar(160) NOT NULL,
                status text NOT NULL DEFAULT 'pending',
                created_at timestamptz NOT NULL DEFAULT now(),
                updated_at timestamptz
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a handful of demo messages when the table is empty so a fresh
    /// deployment has something to deliver.
    pub async fn seed_if_empty(&self) -> anyhow::Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        for n in 1..=8 {
            sqlx::query("INSERT INTO messages (phone_number, content) VALUES ($1, $2)")
                .bind(format!("+90554999887{n}"))
                .bind(format!("Hello World {n}"))
                .execute(&self.pool)
                .await?;
        }
        tracing::info!("seeded demo messages");
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageStore for PgMessageStore {
    async fn claim(&self, limit: usize) -> anyhow::Result<Vec<Message>> {
        let mut tx = self.pool.begin().await?;

        // Rows locked by a concurrent claim are skipped instead of waited
        // on, so two schedulers never block each other or double-claim.
        let rows = sqlx::query(
            r#"
            SELECT id, phone_number, content, status, created_at, updated_at
            FROM messages
            WHERE status = 'pending'
            ORDER BY created_at
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let mut messages = rows
            .iter()
            .map(message_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();

        // Marking the rows processing inside the same transaction makes the
        // claim durable before any other claimer can see them again.
        sqlx::query("UPDATE messages SET status = 'processing', updated_at = now() WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        for msg in &mut messages {
            msg.status = MessageStatus::Processing;
        }
        Ok(messages)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: MessageStatus,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE messages SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_delivered(&self) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT id, phone_number, content, status, created_at, updated_at
            FROM messages
            WHERE status = 'success'
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }
}
