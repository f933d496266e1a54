#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, header},
    response::Response,
};
use http_body_util::BodyExt;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;

use storefront::application::auth::{AuthService, hash_password};
use storefront::application::csrf::CsrfGuard;
use storefront::application::mail::SuppressedMailer;
use storefront::application::repos::{CreateUserParams, RepoError, RoleCount, UsersRepo};
use storefront::config;
use storefront::domain::entities::UserRecord;
use storefront::domain::types::UserRole;
use storefront::infra::http::{AppState, build_router, session_store::SessionRegistry};

pub const PASSWORD: &str = "correct horse battery";

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<i64, UserRecord>>,
}

impl MemoryUsers {
    pub async fn seed(&self, username: &str, email: &str, role: UserRole) -> UserRecord {
        let params = CreateUserParams {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(PASSWORD).expect("hash password"),
            role,
        };
        self.create_user(params).await.expect("seed user")
    }
}

#[async_trait]
impl UsersRepo for MemoryUsers {
    async fn find_user(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|user| user.email == params.email || user.username == params.username)
        {
            return Err(RepoError::Duplicate {
                constraint: "users_email_key".into(),
            });
        }
        let record = UserRecord {
            id: users.len() as i64 + 1,
            username: params.username,
            email: params.email,
            password_hash: params.password_hash,
            role: params.role,
            profile: "{}".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn count_users_by_role(&self) -> Result<Vec<RoleCount>, RepoError> {
        let users = self.users.lock().await;
        let mut counts: Vec<RoleCount> = Vec::new();
        for user in users.values() {
            match counts.iter_mut().find(|entry| entry.role == user.role) {
                Some(entry) => entry.count += 1,
                None => counts.push(RoleCount {
                    role: user.role,
                    count: 1,
                }),
            }
        }
        Ok(counts)
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUsers>,
    pub mailer: SuppressedMailer,
    pub sessions: SessionRegistry,
}

impl TestApp {
    /// Full route tree for `profile` over in-memory extensions.
    pub fn new(profile: &str) -> Self {
        let settings = config::for_profile(profile).expect("profile resolves");
        let users = Arc::new(MemoryUsers::default());
        let mailer = SuppressedMailer::recording();
        let auth = Arc::new(AuthService::new(users.clone(), Arc::new(mailer.clone())));
        let sessions = SessionRegistry::new();
        let state = AppState {
            auth,
            csrf: CsrfGuard::new(settings.csrf.enabled),
            sessions: sessions.clone(),
            db: None,
        };

        Self {
            router: build_router(state, &settings.session),
            users,
            mailer,
            sessions,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, path: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    /// Sign in a seeded user and return the session cookie.
    pub async fn sign_in(&self, email: &str) -> String {
        let response = self
            .post_form(
                "/auth/login",
                &format!("email={}&password={}", encode(email), encode(PASSWORD)),
                None,
            )
            .await;
        assert_eq!(response.status(), 303, "login should redirect");
        session_cookie(response.headers()).expect("login sets a session cookie")
    }
}

pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// `name=value` pair of the session cookie, if one was issued.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("storefront_session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

pub async fn body_to_string(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

/// Extract the CSRF token embedded in a rendered page.
pub fn csrf_from_page(html: &str) -> Option<String> {
    let marker = r#"name="csrf-token" content=""#;
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')? + start;
    Some(html[start..end].to_string())
}
