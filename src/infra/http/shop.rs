use axum::{Router, http::StatusCode, response::Response, routing::get};

use crate::presentation::views::{LayoutContext, ShopTemplate, ShopView, render_template_response};

use super::{AppState, Blueprint, extract::PageChrome};

pub(super) fn blueprint() -> Blueprint {
    let router: Router<AppState> = Router::new()
        .route("/shop", get(index))
        .route("/shop/", get(index));
    Blueprint::new("shop", "/shop", router)
}

async fn index(PageChrome(chrome): PageChrome) -> Response {
    let view = LayoutContext::new(
        chrome,
        ShopView {
            heading: "Browse the catalogue",
        },
    );
    render_template_response(ShopTemplate { view }, StatusCode::OK)
}
