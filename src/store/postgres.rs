//! `sqlx`-backed [`Store`] for production deployments.
//!
//! Grounded on the everruns-style Postgres access pattern from the
//! retrieval pack: a single `PgPool`, hand-written queries (no query
//! builder), and `RETURNING *` to read back the row a write touched in one
//! round trip. The atomic claim in [`PgStore::claim_next_pending_event`] is
//! the one place correctness depends on a database guarantee rather than
//! application-level locking: `UPDATE ... WHERE status = 'pending' ...
//! RETURNING *` inside a single statement is atomic under Postgres's MVCC,
//! so two workers racing for the same thread's queue can never both win.

use crate::error::Result;
use crate::model::{
    Event, EventPayload, EventStatus, Message, SenderType, Thread, ThreadStatus, ToolCall,
    ToolLog, ToolLogStatus, User,
};
use crate::store::{EnqueueOptions, NewMessage, NewToolLog, Store, ThreadSpec};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

/// A [`Store`] backed by a Postgres connection pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wraps an already-constructed pool, e.g. one shared with other
    /// subsystems in the host application.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the crate's bundled migrations (see `migrations/`).
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::ConversantError::Configuration(e.to_string()))
    }

    fn row_to_thread(row: &sqlx::postgres::PgRow) -> sqlx::Result<Thread> {
        let status: String = row.try_get("status")?;
        Ok(Thread {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            name: row.try_get("name")?,
            participants: row
                .try_get::<serde_json::Value, _>("participants")?
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            status: if status == "archived" {
                ThreadStatus::Archived
            } else {
                ThreadStatus::Active
            },
            summary: row.try_get("summary")?,
            parent_thread_id: row.try_get("parent_thread_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_message(row: &sqlx::postgres::PgRow) -> sqlx::Result<Message> {
        let sender_type: String = row.try_get("sender_type")?;
        let tool_calls: Option<serde_json::Value> = row.try_get("tool_calls")?;
        Ok(Message {
            id: row.try_get("id")?,
            thread_id: row.try_get("thread_id")?,
            sender_id: row.try_get("sender_id")?,
            sender_type: parse_sender_type(&sender_type),
            content: row.try_get("content")?,
            tool_calls: tool_calls.and_then(|v| serde_json::from_value::<Vec<ToolCall>>(v).ok()),
            tool_call_id: row.try_get("tool_call_id")?,
            sender_user_id: row.try_get("sender_user_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_event(row: &sqlx::postgres::PgRow) -> sqlx::Result<Event> {
        let payload: serde_json::Value = row.try_get("payload")?;
        let status: String = row.try_get("status")?;
        let ttl_ms: Option<i64> = row.try_get("ttl_ms")?;
        Ok(Event {
            id: row.try_get("id")?,
            thread_id: row.try_get("thread_id")?,
            payload: serde_json::from_value(payload).map_err(|e| {
                sqlx::Error::Decode(Box::new(e))
            })?,
            parent_event_id: row.try_get("parent_event_id")?,
            trace_id: row.try_get("trace_id")?,
            priority: row.try_get("priority")?,
            status: parse_event_status(&status),
            ttl_ms: ttl_ms.map(|v| v as u64),
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_user(row: &sqlx::postgres::PgRow) -> sqlx::Result<User> {
        let metadata: Option<serde_json::Value> = row.try_get("metadata")?;
        Ok(User {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            metadata: metadata
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
        })
    }
}

fn parse_sender_type(s: &str) -> SenderType {
    match s {
        "agent" => SenderType::Agent,
        "tool" => SenderType::Tool,
        "system" => SenderType::System,
        _ => SenderType::User,
    }
}

fn sender_type_str(t: SenderType) -> &'static str {
    match t {
        SenderType::User => "user",
        SenderType::Agent => "agent",
        SenderType::Tool => "tool",
        SenderType::System => "system",
    }
}

fn parse_event_status(s: &str) -> EventStatus {
    match s {
        "processing" => EventStatus::Processing,
        "completed" => EventStatus::Completed,
        "failed" => EventStatus::Failed,
        _ => EventStatus::Pending,
    }
}

fn event_status_str(s: EventStatus) -> &'static str {
    match s {
        EventStatus::Pending => "pending",
        EventStatus::Processing => "processing",
        EventStatus::Completed => "completed",
        EventStatus::Failed => "failed",
    }
}

fn tool_log_status_str(s: ToolLogStatus) -> &'static str {
    match s {
        ToolLogStatus::Success => "success",
        ToolLogStatus::Error => "error",
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_or_create_thread(&self, id: &str, spec: ThreadSpec) -> Result<Thread> {
        let participants = serde_json::to_value(&spec.participants)?;
        let row = sqlx::query(
            r#"
            INSERT INTO threads (id, external_id, name, participants, status, parent_thread_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'active', $5, now(), now())
            ON CONFLICT (id) DO UPDATE SET id = threads.id
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&spec.external_id)
        .bind(&spec.name)
        .bind(&participants)
        .bind(&spec.parent_thread_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Self::row_to_thread(&row)?)
    }

    async fn get_thread_by_id(&self, id: &str) -> Result<Option<Thread>> {
        let row = sqlx::query("SELECT * FROM threads WHERE id = $1 AND status = 'active'")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(Self::row_to_thread)
            .transpose()
            .map_err(Into::into)
    }

    async fn archive_thread(&self, id: &str, summary: Option<String>) -> Result<Thread> {
        let row = sqlx::query(
            r#"
            UPDATE threads
            SET status = 'archived',
                summary = COALESCE($2, summary),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&summary)
        .fetch_one(&self.pool)
        .await?;
        Ok(Self::row_to_thread(&row)?)
    }

    async fn get_message_history(
        &self,
        thread_id: &str,
        for_sender_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            WITH RECURSIVE ancestry(id, parent_thread_id, level) AS (
                SELECT id, parent_thread_id, 0 FROM threads WHERE id = $1
                UNION ALL
                SELECT t.id, t.parent_thread_id, a.level + 1
                FROM threads t
                JOIN ancestry a ON t.id = a.parent_thread_id
            ),
            matched AS (
                SELECT m.*, a.level
                FROM messages m
                JOIN ancestry a ON m.thread_id = a.id
                JOIN threads t ON t.id = a.id
                WHERE a.id = $1
                   OR (t.participants @> to_jsonb($2::text))
            ),
            -- `limit` bounds the most recent history, not the oldest —
            -- select off the tail first, then re-apply the full ordering.
            recent AS (
                SELECT * FROM matched
                ORDER BY created_at DESC
                LIMIT $3
            )
            SELECT * FROM recent
            ORDER BY created_at ASC, level DESC
            "#,
        )
        .bind(thread_id)
        .bind(for_sender_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(Self::row_to_message)
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message> {
        let tool_calls = message
            .tool_calls
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let row = sqlx::query(
            r#"
            INSERT INTO messages
                (id, thread_id, sender_id, sender_type, content, tool_calls, tool_call_id, sender_user_id, created_at)
            VALUES (gen_random_uuid()::text, $1, $2, $3, $4, $5, $6, $7, now())
            RETURNING *
            "#,
        )
        .bind(&message.thread_id)
        .bind(&message.sender_id)
        .bind(sender_type_str(message.sender_type))
        .bind(&message.content)
        .bind(&tool_calls)
        .bind(&message.tool_call_id)
        .bind(&message.sender_user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Self::row_to_message(&row)?)
    }

    async fn enqueue(
        &self,
        thread_id: &str,
        payload: EventPayload,
        options: EnqueueOptions,
    ) -> Result<Event> {
        let payload_json = serde_json::to_value(&payload)?;
        let ttl_ms = options.ttl_ms.map(|v| v as i64);
        let row = sqlx::query(
            r#"
            INSERT INTO events
                (id, thread_id, payload, parent_event_id, trace_id, priority, status, ttl_ms, expires_at, created_at, updated_at)
            VALUES (
                gen_random_uuid()::text, $1, $2, $3, $4, $5, 'pending', $6,
                CASE WHEN $6::bigint IS NULL THEN NULL ELSE now() + make_interval(secs => $6::bigint / 1000.0) END,
                now(), now()
            )
            RETURNING *
            "#,
        )
        .bind(thread_id)
        .bind(&payload_json)
        .bind(&options.parent_event_id)
        .bind(&options.trace_id)
        .bind(options.priority)
        .bind(ttl_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(Self::row_to_event(&row)?)
    }

    async fn get_processing_queue_item(&self, thread_id: &str) -> Result<Option<Event>> {
        let row = sqlx::query("SELECT * FROM events WHERE thread_id = $1 AND status = 'processing' LIMIT 1")
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(Self::row_to_event)
            .transpose()
            .map_err(Into::into)
    }

    async fn claim_next_pending_event(&self, thread_id: &str) -> Result<Option<Event>> {
        // Expire anything whose TTL passed before considering order, same
        // as the in-memory store, so both backends agree on the queue's
        // observable contents.
        sqlx::query(
            r#"
            UPDATE events
            SET status = 'failed', updated_at = now()
            WHERE thread_id = $1 AND status = 'pending'
              AND expires_at IS NOT NULL AND expires_at <= now()
            "#,
        )
        .bind(thread_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"
            UPDATE events
            SET status = 'processing', updated_at = now()
            WHERE id = (
                SELECT id FROM events
                WHERE thread_id = $1 AND status = 'pending'
                ORDER BY priority DESC, created_at ASC, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(Self::row_to_event)
            .transpose()
            .map_err(Into::into)
    }

    async fn complete_event(&self, event_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE events SET status = $2, updated_at = now() WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(event_id)
        .bind(event_status_str(EventStatus::Completed))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_event(&self, event_id: &str, _reason: &str) -> Result<()> {
        sqlx::query(
            "UPDATE events SET status = $2, updated_at = now() WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(event_id)
        .bind(event_status_str(EventStatus::Failed))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_tool_logs(&self, entries: Vec<NewToolLog>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO tool_logs
                    (id, thread_id, tool_name, tool_input, tool_output, status, error_message, created_at)
                VALUES (gen_random_uuid()::text, $1, $2, $3, $4, $5, $6, now())
                "#,
            )
            .bind(&entry.thread_id)
            .bind(&entry.tool_name)
            .bind(&entry.tool_input)
            .bind(&entry.tool_output)
            .bind(tool_log_status_str(entry.status))
            .bind(&entry.error_message)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_user(&self, user: User) -> Result<User> {
        // Resolve the row to update by the same chain as the in-memory
        // store: primary id, then external id, then email, each only
        // considered when the caller actually supplied it.
        let existing_id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM users
            WHERE id = $1
               OR ($2::text IS NOT NULL AND external_id = $2)
               OR ($3::text IS NOT NULL AND email = $3)
            LIMIT 1
            "#,
        )
        .bind(&user.id)
        .bind(&user.external_id)
        .bind(&user.email)
        .fetch_optional(&self.pool)
        .await?;

        let id = existing_id.unwrap_or_else(|| user.id.clone());
        let metadata = serde_json::to_value(&user.metadata)?;
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, external_id, email, name, metadata)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                external_id = COALESCE(EXCLUDED.external_id, users.external_id),
                email = COALESCE(EXCLUDED.email, users.email),
                name = COALESCE(EXCLUDED.name, users.name),
                metadata = EXCLUDED.metadata
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&user.external_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(Self::row_to_user(&row)?)
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(Self::row_to_user)
            .transpose()
            .map_err(Into::into)
    }
}
