//! Request extractors resolving the session principal.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::warn;
use url::form_urlencoded;

use crate::{
    application::{
        auth::{LOGIN_MESSAGE, LOGIN_VIEW},
        error::HttpError,
        flash::FlashCategory,
    },
    domain::{entities::UserRecord, types::UserRole},
    presentation::views::{CurrentUserView, LayoutChrome, render_error_response},
};

use super::{AppState, middleware::RequestContext, repo_error_to_http, session};

const SOURCE: &str = "infra::http::extract";

/// Per-request cache so the loader runs at most once.
#[derive(Clone)]
struct ResolvedUser(Option<UserRecord>);

async fn session_from_parts(parts: &mut Parts, state: &AppState) -> Result<Session, Response> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(IntoResponse::into_response)
}

/// Signed-in user, if any.
pub struct CurrentUser(pub Option<UserRecord>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(ResolvedUser(user)) = parts.extensions.get::<ResolvedUser>() {
            return Ok(Self(user.clone()));
        }

        let session = session_from_parts(parts, state).await?;
        let user = match session::user_id(&session)
            .await
            .map_err(IntoResponse::into_response)?
        {
            Some(id) => state
                .auth
                .load_user(&id)
                .await
                .map_err(|err| repo_error_to_http(SOURCE, err).into_response())?,
            None => None,
        };

        if let (Some(ctx), Some(user)) = (parts.extensions.get::<RequestContext>(), &user) {
            ctx.record_user(user.id);
        }
        parts.extensions.insert(ResolvedUser(user.clone()));
        Ok(Self(user))
    }
}

/// Build the layout values for a full-page render, draining pending flashes.
///
/// A CSRF token is minted only when the page carries a form: every page for a
/// signed-in user (the logout form) or when `has_form` is set. Otherwise an
/// already stored token is reused, so anonymous reads never create a session.
pub async fn load_chrome(
    session: &Session,
    state: &AppState,
    user: Option<&UserRecord>,
    has_form: bool,
) -> Result<LayoutChrome, HttpError> {
    let flashes = session::take_flashes(session).await?;
    let csrf_token = if has_form || user.is_some() {
        session::csrf_token(session, &state.csrf).await?
    } else {
        session::stored_csrf_token(session).await?.unwrap_or_default()
    };
    Ok(LayoutChrome {
        current_user: user.map(CurrentUserView::from),
        flashes,
        csrf_token,
    })
}

async fn chrome_from_parts(
    parts: &mut Parts,
    state: &AppState,
    has_form: bool,
) -> Result<LayoutChrome, Response> {
    let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
    let session = session_from_parts(parts, state).await?;
    load_chrome(&session, state, user.as_ref(), has_form)
        .await
        .map_err(IntoResponse::into_response)
}

/// Layout chrome for read-only pages.
pub struct PageChrome(pub LayoutChrome);

impl FromRequestParts<AppState> for PageChrome {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        chrome_from_parts(parts, state, false).await.map(Self)
    }
}

/// Layout chrome for pages that render a form; always carries a CSRF token.
pub struct FormChrome(pub LayoutChrome);

impl FromRequestParts<AppState> for FormChrome {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        chrome_from_parts(parts, state, true).await.map(Self)
    }
}

/// A signed-in user; anonymous visitors are sent to the login view.
pub struct RequireUser(pub UserRecord);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await? {
            CurrentUser(Some(user)) => Ok(Self(user)),
            CurrentUser(None) => Err(login_redirect(parts, state).await),
        }
    }
}

async fn login_redirect(parts: &mut Parts, state: &AppState) -> Response {
    let session = match session_from_parts(parts, state).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    if let Err(err) = session::flash(&session, FlashCategory::Info, LOGIN_MESSAGE).await {
        return err.into_response();
    }

    let next = parts
        .uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    Redirect::to(&login_url(next)).into_response()
}

pub fn login_url(next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_VIEW}?next={encoded}")
}

pub trait RoleGate {
    const ROLE: UserRole;
}

pub struct AdminGate;

impl RoleGate for AdminGate {
    const ROLE: UserRole = UserRole::Admin;
}

pub struct DeliveryGate;

impl RoleGate for DeliveryGate {
    const ROLE: UserRole = UserRole::Delivery;
}

/// A signed-in user whose role satisfies `G`; others receive a 403 page.
pub struct RequireRole<G> {
    pub user: UserRecord,
    gate: PhantomData<G>,
}

pub type RequireAdmin = RequireRole<AdminGate>;
pub type RequireDelivery = RequireRole<DeliveryGate>;

impl<G> FromRequestParts<AppState> for RequireRole<G>
where
    G: RoleGate + Send,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if user.role.satisfies(G::ROLE) {
            return Ok(Self {
                user,
                gate: PhantomData,
            });
        }

        let required = G::ROLE;
        warn!(
            target = "storefront::http::access",
            user_id = user.id,
            role = %user.role,
            required = %required,
            path = %parts.uri.path(),
            "role gate rejected request"
        );
        let session = session_from_parts(parts, state).await?;
        match load_chrome(&session, state, Some(&user), false).await {
            Ok(chrome) => Err(render_error_response(chrome, StatusCode::FORBIDDEN)),
            Err(err) => Err(err.into_response()),
        }
    }
}
