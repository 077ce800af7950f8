use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

use crate::models::user::User;

/// Operator lookup and permission checks used by the protected handlers
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn find_active_user(&self, user_id: i64) -> Result<Option<User>, sqlx::Error>;

    async fn has_permission(
        &self,
        user_id: i64,
        module: &str,
        action: &str,
    ) -> Result<bool, sqlx::Error>;
}

/// Reads users and grants from PostgreSQL on every call
#[derive(Clone)]
pub struct PgAccessControl {
    pool: PgPool,
}

impl PgAccessControl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessControl for PgAccessControl {
    async fn find_active_user(&self, user_id: i64) -> Result<Option<User>, sqlx::Error> {
        User::find_active_by_id(&self.pool, user_id).await
    }

    async fn has_permission(
        &self,
        user_id: i64,
        module: &str,
        action: &str,
    ) -> Result<bool, sqlx::Error> {
        User::has_permission(&self.pool, user_id, module, action).await
    }
}

/// Fixed set of operators and grants, for tests and local runs
#[derive(Debug, Default)]
pub struct StaticAccessControl {
    users: HashMap<i64, User>,
    grants: HashSet<(i64, String, String)>,
}

impl StaticAccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: i64, username: &str) -> Self {
        self.users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                password_hash: String::new(),
                role_id: None,
                is_active: true,
                last_login: None,
            },
        );
        self
    }

    pub fn grant(mut self, user_id: i64, module: &str, action: &str) -> Self {
        self.grants
            .insert((user_id, module.to_string(), action.to_string()));
        self
    }
}

#[async_trait]
impl AccessControl for StaticAccessControl {
    async fn find_active_user(&self, user_id: i64) -> Result<Option<User>, sqlx::Error> {
        Ok(self.users.get(&user_id).filter(|u| u.is_active).cloned())
    }

    async fn has_permission(
        &self,
        user_id: i64,
        module: &str,
        action: &str,
    ) -> Result<bool, sqlx::Error> {
        Ok(self
            .grants
            .contains(&(user_id, module.to_string(), action.to_string())))
    }
}
