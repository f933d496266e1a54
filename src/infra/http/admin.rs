use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::repos::RoleCount,
    domain::types::UserRole,
    presentation::views::{
        AdminDashboardTemplate, AdminDashboardView, LayoutContext, RoleCountView,
        render_template_response,
    },
};

use super::{
    AppState, Blueprint,
    extract::{PageChrome, RequireAdmin},
    repo_error_to_http,
};

const ROLES: [UserRole; 3] = [UserRole::Customer, UserRole::Delivery, UserRole::Admin];

pub(super) fn blueprint() -> Blueprint {
    let router: Router<AppState> = Router::new()
        .route("/admin", get(dashboard))
        .route("/admin/", get(dashboard));
    Blueprint::new("admin", "/admin", router)
}

async fn dashboard(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    PageChrome(chrome): PageChrome,
) -> Response {
    let counts = match state.auth.users().count_users_by_role().await {
        Ok(counts) => counts,
        Err(err) => {
            return repo_error_to_http("infra::http::admin::dashboard", err).into_response();
        }
    };

    let view = LayoutContext::new(chrome, dashboard_view(&counts));
    render_template_response(AdminDashboardTemplate { view }, StatusCode::OK)
}

fn dashboard_view(counts: &[RoleCount]) -> AdminDashboardView {
    let roles: Vec<RoleCountView> = ROLES
        .iter()
        .map(|role| RoleCountView {
            label: role.label(),
            count: counts
                .iter()
                .find(|entry| entry.role == *role)
                .map_or(0, |entry| entry.count),
        })
        .collect();
    let total_users = roles.iter().map(|entry| entry.count).sum();
    AdminDashboardView { roles, total_users }
}
