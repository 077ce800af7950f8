use sqlx::PgPool;
use std::sync::Arc;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::sanctions::SanctionStore;
use crate::services::access::AccessControl;

/// Session keys used in the application
pub const SESSION_KEY_USER_ID: &str = "user_id";
pub const SESSION_KEY_CSRF_TOKEN: &str = "csrf_token";
pub const SESSION_KEY_RETURN_URL: &str = "return_url";

/// Creates a session layer for Axum
pub async fn create_session_layer(
    pool: PgPool,
    secure: bool,
    ttl_hours: i64,
) -> Result<SessionManagerLayer<PostgresStore>, sqlx::Error> {
    // Create the session store backed by PostgreSQL
    let session_store = PostgresStore::new(pool);
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(ttl_hours)));

    Ok(session_layer)
}

/// Application context built once at startup and shared with every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub sanctions: Arc<dyn SanctionStore>,
    pub access: Arc<dyn AccessControl>,
}
