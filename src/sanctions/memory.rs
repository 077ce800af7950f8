use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::policy::{MemberCategory, SanctionType};
use super::store::{SanctionChange, SanctionStore, StoreError};
use crate::models::{activity_log::ActivityLog, member::Member, sanction::Sanction};

/// Audit entry kept by the in-memory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub user_id: i64,
    pub action: String,
    pub module: String,
    pub record_id: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct State {
    members: HashMap<(MemberCategory, i64), Member>,
    sanctions: HashMap<(MemberCategory, i64), Sanction>,
    audit: Vec<AuditEntry>,
    next_sanction_id: i64,
    fail_status_writes: bool,
}

/// In-process sanction store for tests and local development.
///
/// `apply_sanction` stages every write on a copy of the state and swaps it
/// in only when all writes succeed, matching the transactional contract of
/// the database store.
#[derive(Debug, Default)]
pub struct InMemorySanctionStore {
    state: Mutex<State>,
}

impl InMemorySanctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_member(
        &self,
        category: MemberCategory,
        id: i64,
        first_name: &str,
        last_name: &str,
        member_status: &str,
    ) {
        let member = Member {
            id,
            registration_number: Some(format!("{:06}", id)),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            member_status: member_status.to_string(),
            approval_date: None,
            termination_date: None,
        };
        self.state.lock().await.members.insert((category, id), member);
    }

    /// Seeds a historical sanction without touching the member status
    pub async fn insert_sanction(
        &self,
        category: MemberCategory,
        member_id: i64,
        sanction_date: NaiveDate,
        sanction_type: SanctionType,
    ) -> i64 {
        let mut state = self.state.lock().await;
        state.next_sanction_id += 1;
        let id = state.next_sanction_id;
        state.sanctions.insert(
            (category, id),
            Sanction {
                id,
                member_id,
                sanction_date,
                sanction_type: sanction_type.as_str().to_string(),
                reason: None,
                created_by: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Makes every subsequent member-status write fail
    pub async fn fail_status_writes(&self, fail: bool) {
        self.state.lock().await.fail_status_writes = fail;
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }
}

fn sorted_for_member(state: &State, category: MemberCategory, member_id: i64) -> Vec<Sanction> {
    let mut sanctions: Vec<Sanction> = state
        .sanctions
        .iter()
        .filter(|((c, _), s)| *c == category && s.member_id == member_id)
        .map(|(_, s)| s.clone())
        .collect();
    sanctions.sort_by(|a, b| {
        b.sanction_date
            .cmp(&a.sanction_date)
            .then_with(|| b.id.cmp(&a.id))
    });
    sanctions
}

#[async_trait]
impl SanctionStore for InMemorySanctionStore {
    async fn find_member(
        &self,
        category: MemberCategory,
        member_id: i64,
    ) -> Result<Option<Member>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.members.get(&(category, member_id)).cloned())
    }

    async fn list_sanctions(
        &self,
        category: MemberCategory,
        member_id: i64,
    ) -> Result<Vec<Sanction>, StoreError> {
        let state = self.state.lock().await;
        Ok(sorted_for_member(&state, category, member_id))
    }

    async fn find_sanction(
        &self,
        category: MemberCategory,
        sanction_id: i64,
    ) -> Result<Option<Sanction>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.sanctions.get(&(category, sanction_id)).cloned())
    }

    async fn recent_activity(
        &self,
        category: MemberCategory,
        member_id: i64,
        limit: i64,
    ) -> Result<Vec<ActivityLog>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .audit
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, e)| e.module == category.module() && e.record_id == member_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|(i, e)| ActivityLog {
                id: i as i64 + 1,
                user_id: Some(e.user_id),
                action: e.action.clone(),
                module: e.module.clone(),
                record_id: Some(e.record_id),
                description: Some(e.description.clone()),
                created_at: e.created_at,
            })
            .collect())
    }

    async fn apply_sanction(&self, change: &SanctionChange) -> Result<Sanction, StoreError> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();

        let sanction = match change.sanction_id {
            Some(id) => {
                let existing = staged
                    .sanctions
                    .get_mut(&(change.category, id))
                    .filter(|s| s.member_id == change.member_id)
                    .ok_or(StoreError::SanctionVanished(id))?;
                existing.sanction_date = change.sanction_date;
                existing.sanction_type = change.sanction_type.as_str().to_string();
                existing.reason = change.reason.clone();
                existing.clone()
            }
            None => {
                staged.next_sanction_id += 1;
                let sanction = Sanction {
                    id: staged.next_sanction_id,
                    member_id: change.member_id,
                    sanction_date: change.sanction_date,
                    sanction_type: change.sanction_type.as_str().to_string(),
                    reason: change.reason.clone(),
                    created_by: Some(change.created_by),
                    created_at: Utc::now(),
                };
                staged
                    .sanctions
                    .insert((change.category, sanction.id), sanction.clone());
                sanction
            }
        };

        if staged.fail_status_writes {
            return Err(StoreError::WriteRejected(format!(
                "status write for member {} refused",
                change.member_id
            )));
        }

        let member = staged
            .members
            .get_mut(&(change.category, change.member_id))
            .ok_or(StoreError::MemberVanished(change.member_id))?;
        member.member_status = change.new_status.as_str().to_string();
        if change.category.policy().records_lifecycle_dates {
            if let Some(date) = change.approval_date {
                member.approval_date = Some(date);
            }
            if let Some(date) = change.termination_date {
                member.termination_date = Some(date);
            }
        }

        staged.audit.push(AuditEntry {
            user_id: change.created_by,
            action: change.audit_action().to_string(),
            module: change.category.module().to_string(),
            record_id: change.member_id,
            description: change.audit_description(),
            created_at: Utc::now(),
        });

        *state = staged;
        Ok(sanction)
    }
}
