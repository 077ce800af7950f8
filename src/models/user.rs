use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// Back-office user (operator of the registry)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub role_id: Option<i64>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Finds an active user by username
    pub async fn find_active_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, username, password_hash, role_id, is_active, last_login
            FROM users
            WHERE username = $1 AND is_active = TRUE
            "#,
        )
        .bind(username)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds an active user by ID
    pub async fn find_active_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, username, password_hash, role_id, is_active, last_login
            FROM users
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Checks a permission granted either through the user's role or directly
    pub async fn has_permission(
        pool: &PgPool,
        user_id: i64,
        module: &str,
        action: &str,
    ) -> Result<bool, sqlx::Error> {
        let granted: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM permissions p
                JOIN role_permissions rp ON rp.permission_id = p.id
                JOIN users u ON u.role_id = rp.role_id
                WHERE u.id = $1 AND p.module = $2 AND p.action = $3
                UNION ALL
                SELECT 1
                FROM permissions p
                JOIN user_permissions up ON up.permission_id = p.id
                WHERE up.user_id = $1 AND p.module = $2 AND p.action = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(module)
        .bind(action)
        .fetch_one(pool)
        .await?;

        Ok(granted)
    }

    pub async fn touch_last_login(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users SET last_login = NOW() WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }
}
