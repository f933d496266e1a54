use axum::{Router, http::StatusCode, response::Response, routing::get};

use crate::presentation::views::{
    DeliveryDashboardTemplate, DeliveryDashboardView, LayoutContext, render_template_response,
};

use super::{
    AppState, Blueprint,
    extract::{PageChrome, RequireDelivery},
};

pub(super) fn blueprint() -> Blueprint {
    let router: Router<AppState> = Router::new()
        .route("/delivery", get(dashboard))
        .route("/delivery/", get(dashboard));
    Blueprint::new("delivery", "/delivery", router)
}

async fn dashboard(staff: RequireDelivery, PageChrome(chrome): PageChrome) -> Response {
    let view = LayoutContext::new(
        chrome,
        DeliveryDashboardView {
            courier: staff.user.username,
        },
    );
    render_template_response(DeliveryDashboardTemplate { view }, StatusCode::OK)
}
