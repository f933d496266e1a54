use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use metrics::counter;
use tower_sessions::Session;
use url::form_urlencoded;

use crate::application::{
    csrf::{CSRF_FORM_FIELD, CSRF_HEADER},
    error::{ErrorReport, HttpError},
};

use super::{AppState, session};

const SOURCE: &str = "infra::http::csrf";
const MAX_FORM_BYTES: usize = 64 * 1024;

fn is_protected(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn is_urlencoded_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn form_token(body: &Bytes) -> Option<String> {
    form_urlencoded::parse(body)
        .find(|(key, _)| key == CSRF_FORM_FIELD)
        .map(|(_, value)| value.into_owned())
}

/// Reject state-changing requests that do not echo the session's token.
pub async fn enforce_csrf(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.csrf.is_enabled() || !is_protected(request.method()) {
        return next.run(request).await;
    }

    let Some(session) = request.extensions().get::<Session>().cloned() else {
        return HttpError::new(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session unavailable",
            "session layer is not installed",
        )
        .into_response();
    };
    let expected = match session::stored_csrf_token(&session).await {
        Ok(token) => token,
        Err(err) => return err.into_response(),
    };

    let (request, provided) = if let Some(token) = header_token(request.headers()) {
        (request, Some(token))
    } else if is_urlencoded_form(request.headers()) {
        let (parts, body) = request.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
            Ok(bytes) => bytes,
            Err(err) => {
                return HttpError::from_error(
                    SOURCE,
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Request body too large",
                    &err,
                )
                .into_response();
            }
        };
        let token = form_token(&bytes);
        (Request::from_parts(parts, Body::from(bytes)), token)
    } else {
        (request, None)
    };

    match state.csrf.verify(expected.as_deref(), provided.as_deref()) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            counter!("storefront_csrf_rejected_total").increment(1);
            let mut response = (StatusCode::BAD_REQUEST, err.to_string()).into_response();
            ErrorReport::from_error(SOURCE, StatusCode::BAD_REQUEST, &err).attach(&mut response);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn only_unsafe_methods_are_protected() {
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(is_protected(&method), "{method}");
        }
        for method in [Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE] {
            assert!(!is_protected(&method), "{method}");
        }
    }

    #[test]
    fn form_token_reads_the_named_field() {
        let body = Bytes::from_static(b"email=a%40b.c&csrf_token=abc-_12&password=x");
        assert_eq!(form_token(&body).as_deref(), Some("abc-_12"));
        assert_eq!(form_token(&Bytes::from_static(b"email=a")), None);
    }

    #[test]
    fn form_detection_accepts_charset_suffix() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        assert!(is_urlencoded_form(&headers));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_urlencoded_form(&headers));
    }
}
