mod admin;
mod api;
mod auth;
mod csrf;
mod delivery;
pub mod extract;
mod home;
pub mod middleware;
pub mod session;
pub mod session_store;
mod shop;
mod user;

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use sqlx::Error as SqlxError;
use tracing::debug;

use crate::application::{
    auth::AuthService, csrf::CsrfGuard, error::ErrorReport, error::HttpError, repos::RepoError,
};
use crate::config::SessionSettings;
use crate::infra::db::PostgresRepositories;
use crate::presentation::views::render_error_response;

use extract::PageChrome;
use middleware::{log_responses, set_request_context};
use session_store::SessionRegistry;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub csrf: CsrfGuard,
    pub sessions: SessionRegistry,
    /// Absent when the router runs over in-memory repositories.
    pub db: Option<Arc<PostgresRepositories>>,
}

/// A named route grouping mounted under a URL prefix.
pub struct Blueprint {
    pub name: &'static str,
    pub url_prefix: &'static str,
    router: Router<AppState>,
}

impl Blueprint {
    fn new(name: &'static str, url_prefix: &'static str, router: Router<AppState>) -> Self {
        Self {
            name,
            url_prefix,
            router,
        }
    }
}

/// Every route grouping in registration order.
pub fn blueprints() -> Vec<Blueprint> {
    vec![
        auth::blueprint(),
        user::blueprint(),
        shop::blueprint(),
        admin::blueprint(),
        delivery::blueprint(),
        api::blueprint(),
        home::blueprint(),
    ]
}

pub fn build_router(state: AppState, session: &SessionSettings) -> Router {
    let mut router = Router::new();
    for blueprint in blueprints() {
        debug!(
            target = "storefront::http",
            blueprint = blueprint.name,
            url_prefix = blueprint.url_prefix,
            "registering blueprint"
        );
        router = router.merge(blueprint.router);
    }

    router
        .route("/_health/db", get(db_health))
        .fallback(not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            csrf::enforce_csrf,
        ))
        .layer(session::session_layer(session, state.sessions.clone()))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn db_health(State(state): State<AppState>) -> Response {
    match state.db.as_ref() {
        Some(db) => db_health_response(db.health_check().await),
        None => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_message(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                "no database pool configured",
            )
            .attach(&mut response);
            response
        }
    }
}

async fn not_found(PageChrome(chrome): PageChrome) -> Response {
    render_error_response(chrome, StatusCode::NOT_FOUND)
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}
