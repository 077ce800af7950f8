use ring::constant_time::verify_slices_are_equal;
use ring::rand::{SecureRandom, SystemRandom};
use tower_sessions::Session;

use crate::api::middleware::session::SESSION_KEY_CSRF_TOKEN;

const TOKEN_LEN: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum CsrfError {
    #[error("Failed to generate CSRF token")]
    Generation,

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Generates a random hex-encoded token (64 characters)
pub fn generate_token() -> Result<String, CsrfError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; TOKEN_LEN];
    rng.fill(&mut bytes).map_err(|_| CsrfError::Generation)?;
    Ok(hex::encode(bytes))
}

/// Compares two tokens in constant time
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    !expected.is_empty() && verify_slices_are_equal(expected.as_bytes(), provided.as_bytes()).is_ok()
}

/// Returns the session's token, creating one on first use
pub async fn session_token(session: &Session) -> Result<String, CsrfError> {
    if let Some(token) = session.get::<String>(SESSION_KEY_CSRF_TOKEN).await? {
        return Ok(token);
    }

    let token = generate_token()?;
    session.insert(SESSION_KEY_CSRF_TOKEN, &token).await?;
    Ok(token)
}

/// Checks a submitted token against the one stored in the session
pub async fn validate(session: &Session, provided: &str) -> Result<bool, CsrfError> {
    let stored: Option<String> = session.get(SESSION_KEY_CSRF_TOKEN).await?;
    Ok(stored.is_some_and(|expected| tokens_match(&expected, provided)))
}
