use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("CSRF error: {0}")]
    Csrf(#[from] crate::services::csrf::CsrfError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Every variant is an infrastructure failure; details stay in the log
        tracing::error!(error = %self, "Request failed");
        let (status, error_message) = (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Errore di sistema. Riprova più tardi.",
        );

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
