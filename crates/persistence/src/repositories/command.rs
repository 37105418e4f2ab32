//! Command queue repository.

use chrono::{DateTime, Utc};
use domain::models::command::SUPERSEDED_REASON;
use domain::models::{CommandCompletion, CommandType, NewCommand, PageCursor};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{CommandEntity, COMMAND_COLUMNS};
use crate::metrics::QueryTimer;

#[derive(Debug, Clone)]
pub struct CommandRepository {
    pool: PgPool,
}

impl CommandRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<CommandEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_command_by_id");
        let sql = format!("SELECT {} FROM commands WHERE id = $1", COMMAND_COLUMNS);
        let result = sqlx::query_as::<_, CommandEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.finish(result)
    }

    /// Fails in-flight commands of the given types on the device. Returns
    /// the affected ids.
    pub async fn supersede(
        conn: &mut PgConnection,
        device_id: Uuid,
        types: &[CommandType],
        at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        if types.is_empty() {
            return Ok(Vec::new());
        }
        let types: Vec<&str> = types.iter().map(CommandType::as_str).collect();
        let mut ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE commands
            SET status = 'failed', failure_reason = $3, executed_at = $4
            WHERE device_id = $1
              AND status IN ('pending', 'sent')
              AND command_type = ANY($2)
            RETURNING id
            "#,
        )
        .bind(device_id)
        .bind(&types)
        .bind(SUPERSEDED_REASON)
        .bind(at)
        .fetch_all(&mut *conn)
        .await?;
        ids.sort();
        Ok(ids)
    }

    pub async fn insert(conn: &mut PgConnection, command: &NewCommand) -> Result<CommandEntity, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO commands (id, device_id, command_type, payload, status, issued_by, created_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6)
            RETURNING {}
            "#,
            COMMAND_COLUMNS
        );
        sqlx::query_as::<_, CommandEntity>(&sql)
            .bind(command.id)
            .bind(command.device_id)
            .bind(command.command_type.as_str())
            .bind(&command.payload)
            .bind(&command.issued_by)
            .bind(command.created_at)
            .fetch_one(conn)
            .await
    }

    /// Claims the oldest pending command. `SKIP LOCKED` keeps concurrent
    /// claimers from ever receiving the same row.
    pub async fn dequeue_next(
        conn: &mut PgConnection,
        device_id: Uuid,
        unlock_only: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<CommandEntity>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE commands
            SET status = 'sent', sent_at = $3
            WHERE id = (
                SELECT id FROM commands
                WHERE device_id = $1
                  AND status = 'pending'
                  AND (NOT $2 OR command_type = 'unlock')
                ORDER BY created_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            COMMAND_COLUMNS
        );
        sqlx::query_as::<_, CommandEntity>(&sql)
            .bind(device_id)
            .bind(unlock_only)
            .bind(now)
            .fetch_optional(conn)
            .await
    }

    pub async fn dequeue_next_pooled(
        &self,
        device_id: Uuid,
        unlock_only: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<CommandEntity>, sqlx::Error> {
        let timer = QueryTimer::new("dequeue_next_command");
        let result: Result<Option<CommandEntity>, sqlx::Error> = async {
            let mut conn = self.pool.acquire().await?;
            Self::dequeue_next(&mut *conn, device_id, unlock_only, now).await
        }
        .await;
        timer.finish(result)
    }

    /// Moves a `sent` command to its terminal state. Returns `None` when the
    /// command is not in `sent`.
    pub async fn complete(
        conn: &mut PgConnection,
        id: Uuid,
        completion: &CommandCompletion,
    ) -> Result<Option<CommandEntity>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE commands
            SET status = $2, executed_at = $3, result_payload = $4, failure_reason = $5
            WHERE id = $1 AND status = 'sent'
            RETURNING {}
            "#,
            COMMAND_COLUMNS
        );
        sqlx::query_as::<_, CommandEntity>(&sql)
            .bind(id)
            .bind(completion.outcome.status().as_str())
            .bind(completion.completed_at)
            .bind(&completion.result_payload)
            .bind(&completion.failure_reason)
            .fetch_optional(conn)
            .await
    }

    /// Newest first, strictly after the cursor.
    pub async fn list_for_device(
        &self,
        device_id: Uuid,
        after: Option<&PageCursor<Uuid>>,
        limit: i64,
    ) -> Result<Vec<CommandEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_commands");
        let sql = format!(
            r#"
            SELECT {}
            FROM commands
            WHERE device_id = $1
              AND ($2::TIMESTAMPTZ IS NULL OR (created_at, id) < ($2, $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
            COMMAND_COLUMNS
        );
        let result = sqlx::query_as::<_, CommandEntity>(&sql)
            .bind(device_id)
            .bind(after.map(|c| c.created_at))
            .bind(after.map(|c| c.id))
            .bind(limit)
            .fetch_all(&self.pool)
            .await;
        timer.finish(result)
    }
}
