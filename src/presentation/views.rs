use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::flash::FlashMessage;
use crate::domain::entities::UserRecord;
use crate::domain::types::UserRole;

use super::filters;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_error_response(chrome: LayoutChrome, status: StatusCode) -> Response {
    let content = ErrorPageView::for_status(status);
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, status);
    ErrorReport::from_message(
        "presentation::views::render_error_response",
        status,
        status.canonical_reason().unwrap_or("error"),
    )
    .attach(&mut response);
    response
}

#[derive(Clone, Debug)]
pub struct CurrentUserView {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub is_admin: bool,
    pub can_deliver: bool,
}

impl From<&UserRecord> for CurrentUserView {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            is_admin: user.is_admin(),
            can_deliver: user.role.satisfies(UserRole::Delivery),
        }
    }
}

/// Per-request values shared by every full-page template.
#[derive(Clone, Debug, Default)]
pub struct LayoutChrome {
    pub current_user: Option<CurrentUserView>,
    pub flashes: Vec<FlashMessage>,
    pub csrf_token: String,
}

/// Layout wrapper; construction injects `now` into every render.
#[derive(Clone)]
pub struct LayoutContext<T> {
    pub now: OffsetDateTime,
    pub current_user: Option<CurrentUserView>,
    pub flashes: Vec<FlashMessage>,
    pub csrf_token: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            now: OffsetDateTime::now_utc(),
            current_user: chrome.current_user,
            flashes: chrome.flashes,
            csrf_token: chrome.csrf_token,
            content,
        }
    }

    pub fn now_iso(&self) -> String {
        self.now
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.now.unix_timestamp().to_string())
    }
}

pub struct HomeView {
    pub shop_href: &'static str,
}

#[derive(Template)]
#[template(path = "main/index.html")]
pub struct HomeTemplate {
    pub view: LayoutContext<HomeView>,
}

#[derive(Default)]
pub struct LoginView {
    pub email: String,
    pub next: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

#[derive(Default)]
pub struct RegisterView {
    pub username: String,
    pub email: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub view: LayoutContext<RegisterView>,
}

pub struct ProfileView {
    pub username: String,
    pub email: String,
    pub role_label: &'static str,
    pub member_since: String,
    pub profile: String,
}

impl From<&UserRecord> for ProfileView {
    fn from(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            role_label: user.role.label(),
            member_since: format!(
                "{:04}-{:02}-{:02}",
                user.created_at.year(),
                u8::from(user.created_at.month()),
                user.created_at.day()
            ),
            profile: user.profile.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "user/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

pub struct ShopView {
    pub heading: &'static str,
}

#[derive(Template)]
#[template(path = "shop/index.html")]
pub struct ShopTemplate {
    pub view: LayoutContext<ShopView>,
}

pub struct RoleCountView {
    pub label: &'static str,
    pub count: u64,
}

pub struct AdminDashboardView {
    pub roles: Vec<RoleCountView>,
    pub total_users: u64,
}

#[derive(Template)]
#[template(path = "admin/index.html")]
pub struct AdminDashboardTemplate {
    pub view: LayoutContext<AdminDashboardView>,
}

pub struct DeliveryDashboardView {
    pub courier: String,
}

#[derive(Template)]
#[template(path = "delivery/index.html")]
pub struct DeliveryDashboardTemplate {
    pub view: LayoutContext<DeliveryDashboardView>,
}

pub struct ErrorPageView {
    pub status: u16,
    pub title: &'static str,
    pub message: &'static str,
}

impl ErrorPageView {
    pub fn for_status(status: StatusCode) -> Self {
        let (title, message) = match status {
            StatusCode::NOT_FOUND => (
                "Page not found",
                "The page you were looking for does not exist.",
            ),
            StatusCode::FORBIDDEN => (
                "Access denied",
                "Your account is not allowed to view this page.",
            ),
            _ => (
                "Something went wrong",
                "The request could not be completed. Please try again later.",
            ),
        };
        Self {
            status: status.as_u16(),
            title,
            message,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
