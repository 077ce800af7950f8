use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String, // "login", "login_failed", "sanction_create", "sanction_update"
    pub module: String,
    pub record_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateActivityLogData {
    pub user_id: Option<i64>,
    pub action: String,
    pub module: String,
    pub record_id: Option<i64>,
    pub description: Option<String>,
}

impl ActivityLog {
    /// Appends an audit entry
    pub async fn record<'e, E>(executor: E, data: CreateActivityLogData) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (user_id, action, module, record_id, description)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(data.user_id)
        .bind(&data.action)
        .bind(&data.module)
        .bind(data.record_id)
        .bind(&data.description)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Most recent entries for a record in a module
    pub async fn list_for_record<'e, E>(
        executor: E,
        module: &str,
        record_id: i64,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let entries = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM activity_logs
            WHERE module = $1 AND record_id = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(module)
        .bind(record_id)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }
}
