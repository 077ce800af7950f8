use async_trait::async_trait;
use sqlx::PgPool;

use super::policy::MemberCategory;
use super::store::{SanctionChange, SanctionStore, StoreError};
use crate::models::{
    activity_log::{ActivityLog, CreateActivityLogData},
    member::Member,
    sanction::{Sanction, SanctionData},
};

/// PostgreSQL-backed sanction store
#[derive(Clone)]
pub struct PgSanctionStore {
    pool: PgPool,
}

impl PgSanctionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SanctionStore for PgSanctionStore {
    async fn find_member(
        &self,
        category: MemberCategory,
        member_id: i64,
    ) -> Result<Option<Member>, StoreError> {
        Ok(Member::find_by_id(&self.pool, category, member_id).await?)
    }

    async fn list_sanctions(
        &self,
        category: MemberCategory,
        member_id: i64,
    ) -> Result<Vec<Sanction>, StoreError> {
        Ok(Sanction::list_by_member(&self.pool, category, member_id).await?)
    }

    async fn find_sanction(
        &self,
        category: MemberCategory,
        sanction_id: i64,
    ) -> Result<Option<Sanction>, StoreError> {
        Ok(Sanction::find_by_id(&self.pool, category, sanction_id).await?)
    }

    async fn recent_activity(
        &self,
        category: MemberCategory,
        member_id: i64,
        limit: i64,
    ) -> Result<Vec<ActivityLog>, StoreError> {
        Ok(ActivityLog::list_for_record(&self.pool, category.module(), member_id, limit).await?)
    }

    async fn apply_sanction(&self, change: &SanctionChange) -> Result<Sanction, StoreError> {
        let data = SanctionData {
            member_id: change.member_id,
            sanction_date: change.sanction_date,
            sanction_type: change.sanction_type,
            reason: change.reason.clone(),
            created_by: change.created_by,
        };

        // Dropping the transaction on any early return rolls everything back
        let mut tx = self.pool.begin().await?;

        let sanction = match change.sanction_id {
            Some(id) => Sanction::update(&mut *tx, change.category, id, &data)
                .await?
                .ok_or(StoreError::SanctionVanished(id))?,
            None => Sanction::create(&mut *tx, change.category, &data).await?,
        };

        let touched = Member::update_status(
            &mut *tx,
            change.category,
            change.member_id,
            change.new_status,
            change.approval_date,
            change.termination_date,
        )
        .await?;

        if touched == 0 {
            return Err(StoreError::MemberVanished(change.member_id));
        }

        ActivityLog::record(
            &mut *tx,
            CreateActivityLogData {
                user_id: Some(change.created_by),
                action: change.audit_action().to_string(),
                module: change.category.module().to_string(),
                record_id: Some(change.member_id),
                description: Some(change.audit_description()),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(sanction)
    }
}
