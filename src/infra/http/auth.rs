use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::{
    application::{
        auth::{AuthError, LOGIN_VIEW, safe_next_path},
        error::HttpError,
        flash::FlashCategory,
    },
    domain::users::NewAccount,
    presentation::views::{
        LayoutContext, LoginTemplate, LoginView, RegisterTemplate, RegisterView,
        render_template_response,
    },
};

use super::{
    AppState, Blueprint,
    extract::{CurrentUser, FormChrome, load_chrome},
    session,
};

const SOURCE: &str = "infra::http::auth";

pub(super) fn blueprint() -> Blueprint {
    let router: Router<AppState> = Router::new()
        .route("/auth", get(index))
        .route("/auth/", get(index))
        .route("/auth/login", get(login_page).post(login_submit))
        .route("/auth/logout", post(logout))
        .route("/auth/register", get(register_page).post(register_submit));
    Blueprint::new("auth", "/auth", router)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginForm {
    email: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegisterForm {
    username: String,
    email: String,
    password: String,
    confirm_password: String,
}

async fn index() -> Redirect {
    Redirect::to(LOGIN_VIEW)
}

fn post_login_target(next: Option<&str>) -> String {
    safe_next_path(next).unwrap_or_else(|| "/".to_string())
}

async fn login_page(
    CurrentUser(user): CurrentUser,
    FormChrome(chrome): FormChrome,
    Query(query): Query<NextQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to(&post_login_target(query.next.as_deref())).into_response();
    }

    let view = LayoutContext::new(
        chrome,
        LoginView {
            next: safe_next_path(query.next.as_deref()),
            ..LoginView::default()
        },
    );
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.auth.authenticate(&form.email, &form.password).await {
        Ok(user) => {
            if let Err(err) = session::sign_in(&session, user.id).await {
                return err.into_response();
            }
            if let Err(err) = session::flash(
                &session,
                FlashCategory::Success,
                format!("Welcome back, {}!", user.username),
            )
            .await
            {
                return err.into_response();
            }
            info!(target = "storefront::auth", user_id = user.id, "user signed in");
            Redirect::to(&post_login_target(form.next.as_deref())).into_response()
        }
        Err(AuthError::InvalidCredentials) => {
            let chrome = match load_chrome(&session, &state, None, true).await {
                Ok(chrome) => chrome,
                Err(err) => return err.into_response(),
            };
            let view = LayoutContext::new(
                chrome,
                LoginView {
                    email: form.email,
                    next: safe_next_path(form.next.as_deref()),
                    error: Some("Invalid email or password.".to_string()),
                },
            );
            render_template_response(LoginTemplate { view }, StatusCode::UNAUTHORIZED)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn logout(session: Session) -> Response {
    if let Err(err) = session::sign_out(&session).await {
        return err.into_response();
    }
    if let Err(err) = session::flash(&session, FlashCategory::Info, "You have been logged out.").await
    {
        return err.into_response();
    }
    Redirect::to("/").into_response()
}

async fn register_page(CurrentUser(user): CurrentUser, FormChrome(chrome): FormChrome) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    let view = LayoutContext::new(chrome, RegisterView::default());
    render_template_response(RegisterTemplate { view }, StatusCode::OK)
}

async fn register_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    let outcome = match NewAccount::parse(
        &form.username,
        &form.email,
        &form.password,
        &form.confirm_password,
    ) {
        Ok(account) => state.auth.register(account).await,
        Err(err) => Err(AuthError::Domain(err)),
    };

    let (status, message) = match outcome {
        Ok(user) => {
            if let Err(err) = session::sign_in(&session, user.id).await {
                return err.into_response();
            }
            if let Err(err) = session::flash(
                &session,
                FlashCategory::Success,
                "Your account has been created.",
            )
            .await
            {
                return err.into_response();
            }
            info!(target = "storefront::auth", user_id = user.id, "account registered");
            return Redirect::to("/").into_response();
        }
        Err(AuthError::Domain(err)) => (StatusCode::BAD_REQUEST, err.to_string()),
        Err(AuthError::AccountExists) => (
            StatusCode::CONFLICT,
            "An account with this email or username already exists.".to_string(),
        ),
        Err(err) => {
            return HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed",
                &err,
            )
            .into_response();
        }
    };

    let chrome = match load_chrome(&session, &state, None, true).await {
        Ok(chrome) => chrome,
        Err(err) => return err.into_response(),
    };
    let view = LayoutContext::new(
        chrome,
        RegisterView {
            username: form.username,
            email: form.email,
            error: Some(message),
        },
    );
    render_template_response(RegisterTemplate { view }, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_login_target_rejects_foreign_hosts() {
        assert_eq!(post_login_target(Some("/user/")), "/user/");
        assert_eq!(post_login_target(Some("https://evil.example/")), "/");
        assert_eq!(post_login_target(Some("//evil.example/")), "/");
        assert_eq!(post_login_target(None), "/");
    }
}
