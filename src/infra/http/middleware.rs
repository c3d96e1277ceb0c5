use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, info, warn};
use url::form_urlencoded;
use uuid::Uuid;

use crate::application::error::ErrorReport;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation id of the current request, echoed in `x-request-id`.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Adopt the caller's `x-request-id` when it is usable, otherwise mint one.
pub async fn set_request_id(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let request_id = RequestId(request_id);
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(request_id);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let spa_url = request.uri().query().and_then(spa_url).unwrap_or_default();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if !status.is_client_error() && !status.is_server_error() {
        debug!(
            target = "spa_api::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            spa_url = %spa_url,
            elapsed_ms,
            request_id = %request_id,
            "request served",
        );
        return response;
    }

    let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("pipeline", Vec::new()),
    };
    let detail = messages.first().map(String::as_str).unwrap_or("");

    if status.is_server_error() {
        error!(
            target = "spa_api::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            spa_url = %spa_url,
            elapsed_ms,
            source,
            detail,
            chain = ?messages,
            request_id = %request_id,
            "request failed",
        );
    } else if status == StatusCode::UNAUTHORIZED {
        info!(
            target = "spa_api::http::response",
            method = %method,
            path = %path,
            spa_url = %spa_url,
            request_id = %request_id,
            "request rejected without a valid preview token",
        );
    } else {
        warn!(
            target = "spa_api::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            spa_url = %spa_url,
            elapsed_ms,
            source,
            detail,
            request_id = %request_id,
            "client request error",
        );
    }

    response
}

/// The `url` parameter of a SPA query string, for log correlation. Picks the
/// same value the pipeline reads: first non-blank, key case ignored.
fn spa_url(query: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .filter(|(name, _)| name.eq_ignore_ascii_case("url"))
        .map(|(_, value)| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spa_url_is_decoded_from_the_query() {
        assert_eq!(
            spa_url("parts=site&url=%2Fen%2Fabout%2F").as_deref(),
            Some("/en/about/")
        );
        assert_eq!(spa_url("URL=%2Fda%2F").as_deref(), Some("/da/"));
        assert_eq!(spa_url("url=&Url=%2Fen%2F").as_deref(), Some("/en/"));
        assert_eq!(spa_url("parts=site"), None);
    }
}
