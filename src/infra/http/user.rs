use axum::{Router, http::StatusCode, response::Response, routing::get};

use crate::presentation::views::{
    LayoutContext, ProfileTemplate, ProfileView, render_template_response,
};

use super::{
    AppState, Blueprint,
    extract::{PageChrome, RequireUser},
};

pub(super) fn blueprint() -> Blueprint {
    let router: Router<AppState> = Router::new()
        .route("/user", get(profile))
        .route("/user/", get(profile));
    Blueprint::new("user", "/user", router)
}

async fn profile(RequireUser(user): RequireUser, PageChrome(chrome): PageChrome) -> Response {
    let view = LayoutContext::new(chrome, ProfileView::from(&user));
    render_template_response(ProfileTemplate { view }, StatusCode::OK)
}
