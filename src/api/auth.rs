use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::{
    auth::get_authenticated_user_id,
    session::{AppState, SESSION_KEY_RETURN_URL, SESSION_KEY_USER_ID},
};
use crate::error::AppError;
use crate::models::{
    activity_log::{ActivityLog, CreateActivityLogData},
    user::User,
};
use crate::services::{csrf, password};

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    csrf_token: String,
    username: String,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    username: String,
}

/// Shows the login form
async fn login_form(session: Session) -> Result<LoginTemplate, AppError> {
    Ok(LoginTemplate {
        csrf_token: csrf::session_token(&session).await?,
        username: String::new(),
        error: None,
    })
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
    #[serde(default)]
    csrf_token: String,
}

/// Verifies credentials and opens an authenticated session
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let username = form.username.trim().to_string();

    let error = if !csrf::validate(&session, &form.csrf_token).await? {
        Some("Token di sicurezza non valido")
    } else if username.is_empty() || form.password.is_empty() {
        Some("Per favore inserisci username e password.")
    } else {
        None
    };

    if let Some(error) = error {
        return Ok(LoginTemplate {
            csrf_token: csrf::session_token(&session).await?,
            username,
            error: Some(error.to_string()),
        }
        .into_response());
    }

    let user = User::find_active_by_username(&state.pool, &username).await?;
    let verified = match &user {
        Some(user) => password::verify_password(&form.password, &user.password_hash)
            .unwrap_or_else(|e| {
                tracing::error!(user_id = user.id, error = %e, "Unreadable password hash");
                false
            }),
        None => false,
    };

    let Some(user) = user.filter(|_| verified) else {
        tracing::warn!(username = %username, "Failed login attempt");
        ActivityLog::record(
            &state.pool,
            CreateActivityLogData {
                user_id: None,
                action: "login_failed".to_string(),
                module: "auth".to_string(),
                record_id: None,
                description: Some(format!("Failed login attempt for username: {}", username)),
            },
        )
        .await?;

        return Ok(LoginTemplate {
            csrf_token: csrf::session_token(&session).await?,
            username,
            error: Some("Username o password non corretti.".to_string()),
        }
        .into_response());
    };

    let return_url: Option<String> = session.remove(SESSION_KEY_RETURN_URL).await?;

    // New session ID on privilege change
    session.cycle_id().await?;
    session.insert(SESSION_KEY_USER_ID, user.id).await?;

    User::touch_last_login(&state.pool, user.id).await?;
    ActivityLog::record(
        &state.pool,
        CreateActivityLogData {
            user_id: Some(user.id),
            action: "login".to_string(),
            module: "auth".to_string(),
            record_id: None,
            description: Some("User logged in".to_string()),
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "User authenticated successfully");

    let target = return_url
        .filter(|url| url.starts_with('/') && !url.starts_with("//"))
        .unwrap_or_else(|| "/".to_string());

    Ok(Redirect::to(&target).into_response())
}

/// Logs out the user
async fn logout(session: Session) -> Result<Redirect, AppError> {
    session.flush().await?;
    Ok(Redirect::to("/login"))
}

/// Landing page after login
async fn home(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let Ok(user_id) = get_authenticated_user_id(&session).await else {
        return Ok(Redirect::to("/login").into_response());
    };

    let Some(user) = User::find_active_by_id(&state.pool, user_id).await? else {
        session.flush().await?;
        return Ok(Redirect::to("/login").into_response());
    };

    Ok(HomeTemplate {
        username: user.username,
    }
    .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_form).post(login))
        .route("/logout", post(logout))
}
