use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use crate::sanctions::policy::{MemberCategory, MemberStatus};

/// Member registry row, restricted to the fields the sanction pages use.
///
/// Junior members have no approval/termination dates; those columns are
/// selected as NULL for them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: i64,
    pub registration_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub member_status: String,
    pub approval_date: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Finds a member by ID in the registry of the given category
    pub async fn find_by_id<'e, E>(
        executor: E,
        category: MemberCategory,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = match category {
            MemberCategory::Adult => {
                r#"
                SELECT id, registration_number, first_name, last_name, member_status,
                       approval_date, termination_date
                FROM members WHERE id = $1
                "#
            }
            MemberCategory::Junior => {
                r#"
                SELECT id, registration_number, first_name, last_name, member_status,
                       NULL::DATE AS approval_date, NULL::DATE AS termination_date
                FROM junior_members WHERE id = $1
                "#
            }
        };

        let member = sqlx::query_as::<_, Self>(sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(member)
    }

    /// Overwrites the member status. Dates are only written when provided.
    ///
    /// Returns the number of rows touched (0 when the member does not exist).
    pub async fn update_status<'e, E>(
        executor: E,
        category: MemberCategory,
        id: i64,
        status: MemberStatus,
        approval_date: Option<NaiveDate>,
        termination_date: Option<NaiveDate>,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = match category {
            MemberCategory::Adult => {
                sqlx::query(
                    r#"
                    UPDATE members
                    SET
                        member_status = $2,
                        approval_date = COALESCE($3, approval_date),
                        termination_date = COALESCE($4, termination_date),
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(status.as_str())
                .bind(approval_date)
                .bind(termination_date)
                .execute(executor)
                .await?
            }
            MemberCategory::Junior => {
                sqlx::query(
                    r#"
                    UPDATE junior_members
                    SET member_status = $2, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(status.as_str())
                .execute(executor)
                .await?
            }
        };

        Ok(result.rows_affected())
    }
}
