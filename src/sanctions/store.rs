use async_trait::async_trait;
use chrono::NaiveDate;

use super::policy::{MemberCategory, MemberStatus, SanctionType};
use crate::models::{activity_log::ActivityLog, member::Member, sanction::Sanction};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Member {0} not found during write")]
    MemberVanished(i64),

    #[error("Sanction {0} not found during write")]
    SanctionVanished(i64),

    #[error("Write rejected: {0}")]
    WriteRejected(String),
}

/// One sanction write plus the member projection it produces.
///
/// Stores apply a change as a single unit: the sanction row, the member
/// status (and lifecycle dates) and the audit entry are committed together
/// or not at all.
#[derive(Debug, Clone)]
pub struct SanctionChange {
    pub category: MemberCategory,
    pub member_id: i64,
    /// `None` inserts a new sanction, `Some` updates it in place
    pub sanction_id: Option<i64>,
    pub sanction_date: NaiveDate,
    pub sanction_type: SanctionType,
    pub reason: Option<String>,
    pub created_by: i64,
    pub new_status: MemberStatus,
    pub approval_date: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
}

impl SanctionChange {
    pub fn audit_action(&self) -> &'static str {
        if self.sanction_id.is_some() {
            "sanction_update"
        } else {
            "sanction_create"
        }
    }

    pub fn audit_description(&self) -> String {
        format!(
            "{} dal {}, nuovo stato {}",
            self.sanction_type,
            self.sanction_date.format("%Y-%m-%d"),
            self.new_status
        )
    }
}

/// Persistence collaborators of the sanction engine
#[async_trait]
pub trait SanctionStore: Send + Sync {
    async fn find_member(
        &self,
        category: MemberCategory,
        member_id: i64,
    ) -> Result<Option<Member>, StoreError>;

    /// Sanctions of a member, most recent first
    async fn list_sanctions(
        &self,
        category: MemberCategory,
        member_id: i64,
    ) -> Result<Vec<Sanction>, StoreError>;

    async fn find_sanction(
        &self,
        category: MemberCategory,
        sanction_id: i64,
    ) -> Result<Option<Sanction>, StoreError>;

    /// Latest audit entries recorded against a member, newest first
    async fn recent_activity(
        &self,
        category: MemberCategory,
        member_id: i64,
        limit: i64,
    ) -> Result<Vec<ActivityLog>, StoreError>;

    /// Persists the sanction and overwrites the member status atomically
    async fn apply_sanction(&self, change: &SanctionChange) -> Result<Sanction, StoreError>;
}
