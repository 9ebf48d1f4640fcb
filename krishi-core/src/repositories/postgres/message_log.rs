// krishi-core/src/repositories/postgres/message_log.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use krishi_common::Error;
use krishi_common::models::chat::{ChatMessage, ChatRole};
use krishi_common::traits::repository_traits::MessageLogRepository;

#[derive(Clone)]
pub struct PostgresMessageLogRepository {
    pool: Pool<Postgres>,
}

impl PostgresMessageLogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageLogRepository for PostgresMessageLogRepository {
    async fn append(&self, msg: &ChatMessage) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (message_id, conversation_id, from_role, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&msg.conversation_id)
        .bind(msg.role.as_str())
        .bind(&msg.body)
        .bind(msg.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read_history(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT conversation_id, from_role, body, created_at
            FROM chat_messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let role: ChatRole = row.try_get::<String, _>("from_role")?.parse()?;
            history.push(ChatMessage {
                conversation_id: row.try_get("conversation_id")?,
                role,
                body: row.try_get("body")?,
                timestamp: row.try_get::<DateTime<Utc>, _>("created_at")?,
            });
        }
        Ok(history)
    }
}
