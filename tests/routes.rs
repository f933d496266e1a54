mod support;

use axum::http::StatusCode;
use serde_json::Value;
use storefront::domain::types::UserRole;
use storefront::infra::http::middleware::RequestContext;

use support::{TestApp, body_to_string, csrf_from_page, encode, location, session_cookie};

#[tokio::test]
async fn every_blueprint_root_is_routed() {
    let app = TestApp::new("testing");
    for path in ["/", "/auth/", "/user/", "/shop/", "/admin/", "/delivery/", "/api/"] {
        let response = app.get(path, None).await;
        let status = response.status();
        assert_ne!(status, StatusCode::NOT_FOUND, "{path} is not routed");
        assert_ne!(status, StatusCode::METHOD_NOT_ALLOWED, "{path} rejects GET");
    }
}

#[tokio::test]
async fn unknown_paths_render_the_not_found_page() {
    let app = TestApp::new("testing");
    let response = app.get("/no/such/page", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_to_string(response).await;
    assert!(body.contains("Page not found"));
}

#[tokio::test]
async fn auth_root_redirects_to_login_view() {
    let app = TestApp::new("testing");
    let response = app.get("/auth/", None).await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), Some("/auth/login"));
}

#[tokio::test]
async fn home_page_carries_current_year() {
    let app = TestApp::new("testing");
    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_string(response).await;
    let year = time::OffsetDateTime::now_utc().year().to_string();
    assert!(body.contains(&year));
}

#[tokio::test]
async fn anonymous_reads_do_not_create_sessions() {
    let app = TestApp::new("production");
    for _ in 0..5 {
        let response = app.get("/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(response.headers()).is_none());
        let body = body_to_string(response).await;
        assert!(csrf_from_page(&body).is_none());
    }
    assert_eq!(app.sessions.len().await, 0);

    let response = app.get("/auth/login", None).await;
    assert!(session_cookie(response.headers()).is_some());
    assert_eq!(app.sessions.len().await, 1);
}

#[tokio::test]
async fn anonymous_profile_visit_is_sent_to_login_with_flash() {
    let app = TestApp::new("testing");
    let response = app.get("/user/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login?next=%2Fuser%2F"));
    let cookie = session_cookie(response.headers()).expect("flash stored in session");

    let response = app
        .get("/auth/login?next=%2Fuser%2F", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_string(response).await;
    assert!(body.contains("Please log in to access this page."));
    assert!(body.contains("flash-info"));
    assert!(body.contains(r#"name="next""#));
}

#[tokio::test]
async fn registration_signs_in_and_sends_welcome_mail() {
    let app = TestApp::new("testing");
    let form = format!(
        "username=alice&email={}&password={pw}&confirm_password={pw}",
        encode("Alice@Example.com"),
        pw = encode(support::PASSWORD),
    );
    let response = app.post_form("/auth/register", &form, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    let cookie = session_cookie(response.headers()).expect("session issued");

    let outbox = app.mailer.outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].to, "alice@example.com");

    let response = app.get("/user/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_string(response).await;
    assert!(body.contains("alice@example.com"));
    assert!(body.contains("Your account has been created."));
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = TestApp::new("testing");
    app.users
        .seed("alice", "alice@example.com", UserRole::Customer)
        .await;
    let form = format!(
        "username=alice2&email=alice%40example.com&password={pw}&confirm_password={pw}",
        pw = encode(support::PASSWORD),
    );
    let response = app.post_form("/auth/register", &form, None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(app.mailer.outbox().is_empty());
}

#[tokio::test]
async fn invalid_registration_input_is_reported() {
    let app = TestApp::new("testing");
    let response = app
        .post_form(
            "/auth/register",
            "username=bob&email=bob%40example.com&password=short&confirm_password=short",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_to_string(response).await;
    assert!(body.contains("at least 8 characters"));
}

#[tokio::test]
async fn login_honours_local_next_and_rejects_bad_passwords() {
    let app = TestApp::new("testing");
    app.users
        .seed("carol", "carol@example.com", UserRole::Customer)
        .await;

    let response = app
        .post_form(
            "/auth/login",
            "email=carol%40example.com&password=wrong-password",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let form = format!(
        "email=carol%40example.com&password={}&next=%2Fuser%2F",
        encode(support::PASSWORD)
    );
    let response = app.post_form("/auth/login", &form, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/user/"));
}

#[tokio::test]
async fn logout_clears_the_principal() {
    let app = TestApp::new("testing");
    app.users
        .seed("dave", "dave@example.com", UserRole::Customer)
        .await;
    let cookie = app.sign_in("dave@example.com").await;

    let response = app.post_form("/auth/logout", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(response.headers()).unwrap_or(cookie);

    let response = app.get("/user/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn role_gates_protect_admin_and_delivery_pages() {
    let app = TestApp::new("testing");
    let erin = app
        .users
        .seed("erin", "erin@example.com", UserRole::Customer)
        .await;
    app.users
        .seed("frank", "frank@example.com", UserRole::Delivery)
        .await;
    app.users
        .seed("grace", "grace@example.com", UserRole::Admin)
        .await;

    let customer = app.sign_in("erin@example.com").await;
    let response = app.get("/admin/", Some(&customer)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let ctx = response
        .extensions()
        .get::<RequestContext>()
        .expect("request context attached");
    assert_eq!(ctx.user_id(), Some(erin.id));
    assert_eq!(
        app.get("/delivery/", Some(&customer)).await.status(),
        StatusCode::FORBIDDEN
    );

    let courier = app.sign_in("frank@example.com").await;
    assert_eq!(
        app.get("/delivery/", Some(&courier)).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        app.get("/admin/", Some(&courier)).await.status(),
        StatusCode::FORBIDDEN
    );

    let admin = app.sign_in("grace@example.com").await;
    assert_eq!(
        app.get("/delivery/", Some(&admin)).await.status(),
        StatusCode::OK
    );
    let response = app.get("/admin/", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_string(response).await;
    assert!(body.contains("Delivery staff"));
    assert!(body.contains("<th>3</th>"));
}

#[tokio::test]
async fn api_index_reports_name_version_and_time() {
    let app = TestApp::new("testing");
    let response = app.get("/api/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_to_string(response).await).expect("json body");
    assert_eq!(body["name"], "storefront");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["now"].as_str().is_some_and(|now| now.contains('T')));
}

#[tokio::test]
async fn api_me_requires_a_session() {
    let app = TestApp::new("testing");
    assert_eq!(
        app.get("/api/me", None).await.status(),
        StatusCode::UNAUTHORIZED
    );

    app.users
        .seed("heidi", "heidi@example.com", UserRole::Customer)
        .await;
    let cookie = app.sign_in("heidi@example.com").await;
    let response = app.get("/api/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_to_string(response).await).expect("json body");
    assert_eq!(body["username"], "heidi");
    assert_eq!(body["role"], "customer");
    assert_eq!(body["profile"], serde_json::json!({}));
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn db_health_without_pool_is_unavailable() {
    let app = TestApp::new("testing");
    assert_eq!(
        app.get("/_health/db", None).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn csrf_rejects_unsafe_requests_without_a_token() {
    let app = TestApp::new("development");
    let response = app
        .post_form("/auth/login", "email=a%40b.c&password=x", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_to_string(response).await, "The CSRF token is missing.");
}

#[tokio::test]
async fn csrf_accepts_the_session_token_and_rejects_others() {
    let app = TestApp::new("development");
    let response = app.get("/auth/login", None).await;
    let cookie = session_cookie(response.headers()).expect("session issued");
    let token = csrf_from_page(&body_to_string(response).await).expect("token rendered");

    let response = app
        .post_form(
            "/auth/login",
            "email=a%40b.c&password=x&csrf_token=forged",
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_to_string(response).await, "The CSRF token is invalid.");

    let form = format!("email=a%40b.c&password=x&csrf_token={token}");
    let response = app.post_form("/auth/login", &form, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn csrf_accepts_the_header_token() {
    let app = TestApp::new("development");
    let response = app.get("/auth/register", None).await;
    let cookie = session_cookie(response.headers()).expect("session issued");
    let token = csrf_from_page(&body_to_string(response).await).expect("token rendered");

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/auth/logout")
        .header("cookie", &cookie)
        .header("x-csrf-token", &token)
        .body(axum::body::Body::empty())
        .expect("request");
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}
