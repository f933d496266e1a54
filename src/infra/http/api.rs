//! JSON endpoints under `/api`.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    domain::{entities::UserRecord, types::UserRole},
    presentation::filters::parse_json_or_empty,
};

use super::{AppState, Blueprint, extract::CurrentUser};

pub(super) fn blueprint() -> Blueprint {
    let router: Router<AppState> = Router::new()
        .route("/api", get(index))
        .route("/api/", get(index))
        .route("/api/me", get(me));
    Blueprint::new("api", "/api", router)
}

#[derive(Debug, Serialize)]
struct ApiIndex {
    name: &'static str,
    version: &'static str,
    now: String,
}

#[derive(Debug, Serialize)]
struct MeResponse {
    id: i64,
    username: String,
    email: String,
    role: UserRole,
    profile: Value,
}

impl From<UserRecord> for MeResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            profile: parse_json_or_empty(&user.profile),
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}

async fn index() -> Json<ApiIndex> {
    let now = OffsetDateTime::now_utc();
    Json(ApiIndex {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        now: now
            .format(&Rfc3339)
            .unwrap_or_else(|_| now.unix_timestamp().to_string()),
    })
}

async fn me(CurrentUser(user): CurrentUser) -> Response {
    match user {
        Some(user) => Json(MeResponse::from(user)).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "authentication required" })),
        )
            .into_response(),
    }
}
