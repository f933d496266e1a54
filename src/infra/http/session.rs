//! Session-backed state: signed-in principal, flash queue and CSRF token.

use axum::http::StatusCode;
use tower_sessions::{
    Expiry, Session, SessionManagerLayer, cookie::SameSite, session::Error as SessionError,
};
use tracing::warn;

use crate::application::{
    csrf::CsrfGuard,
    error::HttpError,
    flash::{FlashCategory, FlashMessage},
};
use crate::config::SessionSettings;

use super::session_store::SessionRegistry;

pub const USER_ID_KEY: &str = "_user_id";
pub const FLASHES_KEY: &str = "_flashes";
pub const CSRF_TOKEN_KEY: &str = "csrf_token";

const SOURCE: &str = "infra::http::session";

fn session_error(err: SessionError) -> HttpError {
    HttpError::from_error(
        SOURCE,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Session unavailable",
        &err,
    )
}

pub fn session_layer(
    settings: &SessionSettings,
    store: SessionRegistry,
) -> SessionManagerLayer<SessionRegistry> {
    let layer = SessionManagerLayer::new(store)
        .with_name(settings.cookie_name.clone())
        .with_secure(settings.secure)
        .with_http_only(true)
        .with_same_site(SameSite::Lax);

    match time::Duration::try_from(settings.idle_timeout) {
        Ok(idle) => layer.with_expiry(Expiry::OnInactivity(idle)),
        Err(err) => {
            warn!(
                target = "storefront::http::session",
                error = %err,
                "session idle timeout out of range; using browser-session cookies"
            );
            layer.with_expiry(Expiry::OnSessionEnd)
        }
    }
}

pub async fn user_id(session: &Session) -> Result<Option<String>, HttpError> {
    session
        .get::<String>(USER_ID_KEY)
        .await
        .map_err(session_error)
}

/// Bind the session to `user_id`, issuing a fresh session id.
pub async fn sign_in(session: &Session, user_id: i64) -> Result<(), HttpError> {
    session.cycle_id().await.map_err(session_error)?;
    session
        .insert(USER_ID_KEY, user_id.to_string())
        .await
        .map_err(session_error)
}

pub async fn sign_out(session: &Session) -> Result<(), HttpError> {
    session
        .remove::<String>(USER_ID_KEY)
        .await
        .map_err(session_error)?;
    session.cycle_id().await.map_err(session_error)
}

pub async fn push_flash(session: &Session, message: FlashMessage) -> Result<(), HttpError> {
    let mut queued = session
        .get::<Vec<FlashMessage>>(FLASHES_KEY)
        .await
        .map_err(session_error)?
        .unwrap_or_default();
    queued.push(message);
    session
        .insert(FLASHES_KEY, queued)
        .await
        .map_err(session_error)
}

pub async fn flash(
    session: &Session,
    category: FlashCategory,
    text: impl Into<String>,
) -> Result<(), HttpError> {
    push_flash(session, FlashMessage::new(category, text)).await
}

/// Drain pending flash messages; each message is shown once.
pub async fn take_flashes(session: &Session) -> Result<Vec<FlashMessage>, HttpError> {
    Ok(session
        .remove::<Vec<FlashMessage>>(FLASHES_KEY)
        .await
        .map_err(session_error)?
        .unwrap_or_default())
}

pub async fn stored_csrf_token(session: &Session) -> Result<Option<String>, HttpError> {
    session
        .get::<String>(CSRF_TOKEN_KEY)
        .await
        .map_err(session_error)
}

/// Return the session's CSRF token, minting one on first use.
pub async fn csrf_token(session: &Session, guard: &CsrfGuard) -> Result<String, HttpError> {
    if let Some(token) = stored_csrf_token(session).await? {
        return Ok(token);
    }
    let token = guard.generate_token();
    session
        .insert(CSRF_TOKEN_KEY, token.clone())
        .await
        .map_err(session_error)?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(SessionRegistry::new()), None)
    }

    #[tokio::test]
    async fn flashes_are_drained_once() {
        let session = session();
        flash(&session, FlashCategory::Info, "first").await.unwrap();
        flash(&session, FlashCategory::Success, "second").await.unwrap();

        let drained = take_flashes(&session).await.unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].text, "first");
        assert_eq!(drained[1].kind(), "success");
        assert!(take_flashes(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn csrf_token_is_stable_within_a_session() {
        let session = session();
        let guard = CsrfGuard::new(true);
        let first = csrf_token(&session, &guard).await.unwrap();
        let second = csrf_token(&session, &guard).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            stored_csrf_token(&session).await.unwrap().as_deref(),
            Some(first.as_str())
        );
    }

    #[tokio::test]
    async fn sign_in_and_out_track_the_principal() {
        let session = session();
        sign_in(&session, 42).await.unwrap();
        assert_eq!(user_id(&session).await.unwrap().as_deref(), Some("42"));
        sign_out(&session).await.unwrap();
        assert_eq!(user_id(&session).await.unwrap(), None);
    }
}
