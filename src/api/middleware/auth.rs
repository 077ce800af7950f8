use axum::{
    extract::{OriginalUri, Request},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use tower_sessions::Session;

use super::session::{SESSION_KEY_RETURN_URL, SESSION_KEY_USER_ID};
use crate::services::access::AccessControl;

pub const MSG_LOGIN_REQUIRED: &str = "Autenticazione richiesta";
pub const MSG_FORBIDDEN: &str = "Accesso negato";

/// Authentication error responses
#[derive(Debug)]
pub enum AuthError {
    Unauthorized,
    Forbidden,
    SessionError,
    DatabaseError(sqlx::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthorized => Redirect::to("/login").into_response(),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, MSG_FORBIDDEN).into_response(),
            AuthError::SessionError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error occurred.").into_response()
            }
            AuthError::DatabaseError(e) => {
                tracing::error!(error = %e, "Permission lookup failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
            }
        }
    }
}

/// Middleware that requires the user to be authenticated
pub async fn require_auth(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user_id: Option<i64> = session
        .get(SESSION_KEY_USER_ID)
        .await
        .map_err(|_| AuthError::SessionError)?;

    if user_id.is_none() {
        // Remember the page so login can send the user back to it
        if request.method() == Method::GET {
            let uri = request
                .extensions()
                .get::<OriginalUri>()
                .map(|original| original.0.to_string())
                .unwrap_or_else(|| request.uri().to_string());
            session
                .insert(SESSION_KEY_RETURN_URL, uri)
                .await
                .map_err(|_| AuthError::SessionError)?;
        }
        return Err(AuthError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// JSON counterpart of `require_auth`: answers 401 instead of redirecting
pub async fn require_api_auth(session: Session, request: Request, next: Next) -> Response {
    match session.get::<i64>(SESSION_KEY_USER_ID).await {
        Ok(Some(_)) => next.run(request).await,
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": MSG_LOGIN_REQUIRED })),
        )
            .into_response(),
        Err(_) => AuthError::SessionError.into_response(),
    }
}

/// The logged-in operator
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

/// Extracts the authenticated user ID from the session
pub async fn get_authenticated_user_id(session: &Session) -> Result<i64, AuthError> {
    session
        .get(SESSION_KEY_USER_ID)
        .await
        .map_err(|_| AuthError::SessionError)?
        .ok_or(AuthError::Unauthorized)
}

/// Loads the session user and checks a module/action permission.
///
/// Permissions are read from the database on every call so grants and
/// revocations apply without a new login. A deactivated user loses the
/// session.
pub async fn require_permission(
    access: &dyn AccessControl,
    session: &Session,
    module: &str,
    action: &str,
) -> Result<AuthenticatedUser, AuthError> {
    let user_id = get_authenticated_user_id(session).await?;

    let Some(user) = access
        .find_active_user(user_id)
        .await
        .map_err(AuthError::DatabaseError)?
    else {
        tracing::warn!(user_id, "Session user missing or inactive, forcing logout");
        session.flush().await.map_err(|_| AuthError::SessionError)?;
        return Err(AuthError::Unauthorized);
    };

    let granted = access
        .has_permission(user.id, module, action)
        .await
        .map_err(AuthError::DatabaseError)?;

    if !granted {
        tracing::warn!(user_id, module, action, "Permission denied");
        return Err(AuthError::Forbidden);
    }

    Ok(AuthenticatedUser { user_id: user.id })
}
