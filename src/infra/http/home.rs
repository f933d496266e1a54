use axum::{Router, http::StatusCode, response::Response, routing::get};

use crate::presentation::views::{HomeTemplate, HomeView, LayoutContext, render_template_response};

use super::{AppState, Blueprint, extract::PageChrome};

pub(super) fn blueprint() -> Blueprint {
    let router: Router<AppState> = Router::new().route("/", get(index));
    Blueprint::new("main", "/", router)
}

async fn index(PageChrome(chrome): PageChrome) -> Response {
    let view = LayoutContext::new(chrome, HomeView { shop_href: "/shop/" });
    render_template_response(HomeTemplate { view }, StatusCode::OK)
}
