use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use crate::sanctions::policy::{MemberCategory, SanctionType};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Sanction {
    pub id: i64,
    pub member_id: i64,
    pub sanction_date: NaiveDate,
    pub sanction_type: String, // see SanctionType
    pub reason: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SanctionData {
    pub member_id: i64,
    pub sanction_date: NaiveDate,
    pub sanction_type: SanctionType,
    pub reason: Option<String>,
    pub created_by: i64,
}

/// (table, owner column) for the category's sanction table
fn table_of(category: MemberCategory) -> (&'static str, &'static str) {
    match category {
        MemberCategory::Adult => ("member_sanctions", "member_id"),
        MemberCategory::Junior => ("junior_member_sanctions", "junior_member_id"),
    }
}

impl Sanction {
    /// Parsed sanction type; `None` for values outside the known vocabulary
    pub fn kind(&self) -> Option<SanctionType> {
        self.sanction_type.parse().ok()
    }

    pub fn label(&self) -> &str {
        match self.kind() {
            Some(kind) => kind.label(),
            None => &self.sanction_type,
        }
    }

    /// Lists a member's sanctions, most recent first
    pub async fn list_by_member<'e, E>(
        executor: E,
        category: MemberCategory,
        member_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (table, owner) = table_of(category);
        let sql = format!(
            r#"
            SELECT id, {owner} AS member_id, sanction_date, sanction_type, reason,
                   created_by, created_at
            FROM {table}
            WHERE {owner} = $1
            ORDER BY sanction_date DESC, id DESC
            "#
        );

        let sanctions = sqlx::query_as::<_, Self>(&sql)
            .bind(member_id)
            .fetch_all(executor)
            .await?;

        Ok(sanctions)
    }

    pub async fn find_by_id<'e, E>(
        executor: E,
        category: MemberCategory,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (table, owner) = table_of(category);
        let sql = format!(
            r#"
            SELECT id, {owner} AS member_id, sanction_date, sanction_type, reason,
                   created_by, created_at
            FROM {table}
            WHERE id = $1
            "#
        );

        let sanction = sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(sanction)
    }

    /// Inserts a new sanction row
    pub async fn create<'e, E>(
        executor: E,
        category: MemberCategory,
        data: &SanctionData,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (table, owner) = table_of(category);
        let sql = format!(
            r#"
            INSERT INTO {table} ({owner}, sanction_date, sanction_type, reason, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, {owner} AS member_id, sanction_date, sanction_type, reason,
                      created_by, created_at
            "#
        );

        let sanction = sqlx::query_as::<_, Self>(&sql)
            .bind(data.member_id)
            .bind(data.sanction_date)
            .bind(data.sanction_type.as_str())
            .bind(&data.reason)
            .bind(data.created_by)
            .fetch_one(executor)
            .await?;

        Ok(sanction)
    }

    /// Updates a sanction in place. The original author is kept.
    ///
    /// Returns `None` when no sanction with this ID belongs to the member.
    pub async fn update<'e, E>(
        executor: E,
        category: MemberCategory,
        id: i64,
        data: &SanctionData,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (table, owner) = table_of(category);
        let sql = format!(
            r#"
            UPDATE {table}
            SET sanction_date = $3, sanction_type = $4, reason = $5
            WHERE id = $1 AND {owner} = $2
            RETURNING id, {owner} AS member_id, sanction_date, sanction_type, reason,
                      created_by, created_at
            "#
        );

        let sanction = sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .bind(data.member_id)
            .bind(data.sanction_date)
            .bind(data.sanction_type.as_str())
            .bind(&data.reason)
            .fetch_optional(executor)
            .await?;

        Ok(sanction)
    }
}
