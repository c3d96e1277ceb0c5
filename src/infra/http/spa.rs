use std::net::SocketAddr;

use axum::{
    Json,
    extract::{
        ConnectInfo, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{
        Extensions, HeaderMap, StatusCode, Uri,
        header::{ACCEPT, AUTHORIZATION, HOST, USER_AGENT},
        uri::Authority,
    },
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    application::{
        arguments::RawRequest,
        error::{AppError, ErrorReport, HttpError},
        options::SpaOptions,
        response::SpaResponse,
    },
    cache::{ContentEvent, ContentEventKind},
};

use super::{AppState, FORWARDED_FOR_HEADER, FORWARDED_PROTO_HEADER, PREVIEW_TOKEN_HEADER};

const DEFAULT_SCHEME: &str = "http";

pub(super) async fn get_data(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    headers: HeaderMap,
    uri: Uri,
    extensions: Extensions,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return malformed_query(
                rejection.status(),
                rejection.body_text(),
                &state.pipeline.services().options,
            );
        }
    };
    let raw = raw_request(&headers, &uri, &extensions, query);
    match state.pipeline.execute(raw).await {
        Ok(response) => response.into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

/// Envelope answered when the query string cannot be read at all.
fn malformed_query(status: StatusCode, detail: String, options: &SpaOptions) -> Response {
    let mut response =
        SpaResponse::error(status, Some("Malformed query string."), options).into_response();
    ErrorReport::from_message("infra::http::spa::get_data", status, detail).attach(&mut response);
    response
}

#[derive(Debug, Deserialize)]
pub(super) struct NotificationBody {
    kind: ContentEventKind,
    #[serde(default)]
    ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationReceipt {
    id: Uuid,
    removed: usize,
    content_generation: u64,
}

pub(super) async fn notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NotificationBody>, JsonRejection>,
) -> Response {
    let services = state.pipeline.services();
    let identity = identity(&headers);
    if !services.access.is_authenticated(identity.as_deref()).await {
        return HttpError::new(
            "infra::http::spa::notify",
            StatusCode::UNAUTHORIZED,
            "User not authenticated.",
            "content notification without a valid preview token",
        )
        .into_response();
    }

    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return HttpError::new(
                "infra::http::spa::notify",
                rejection.status(),
                "Invalid notification body.",
                rejection.body_text(),
            )
            .into_response();
        }
    };

    let event = ContentEvent::new(body.kind, body.ids);
    let removed = services.cache.handle(&event);
    debug!(event_id = %event.id, removed, "Content notification processed");

    let receipt = NotificationReceipt {
        id: event.id,
        removed,
        content_generation: services.cache.generation(),
    };
    (StatusCode::OK, Json(receipt)).into_response()
}

/// Capture the transport view of a request for the pipeline.
pub(super) fn raw_request(
    headers: &HeaderMap,
    uri: &Uri,
    extensions: &Extensions,
    query: Vec<(String, String)>,
) -> RawRequest {
    let scheme = header_str(headers, FORWARDED_PROTO_HEADER)
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .or_else(|| uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_SCHEME.to_string());

    let authority = header_str(headers, HOST.as_str())
        .and_then(|value| value.parse::<Authority>().ok())
        .or_else(|| uri.authority().cloned());
    let (host, port) = match authority {
        Some(authority) => (authority.host().to_string(), authority.port_u16()),
        None => ("localhost".to_string(), None),
    };

    let remote_addr = header_str(headers, FORWARDED_FOR_HEADER)
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        });

    RawRequest {
        scheme,
        host,
        port,
        query,
        accept: header_str(headers, ACCEPT.as_str()).map(str::to_string),
        user_agent: header_str(headers, USER_AGENT.as_str()).map(str::to_string),
        remote_addr,
        identity: identity(headers),
    }
}

/// Preview credential from `Authorization: Bearer` or the preview token header.
fn identity(headers: &HeaderMap) -> Option<String> {
    header_str(headers, AUTHORIZATION.as_str())
        .and_then(|value| {
            let (scheme, token) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then_some(token)
        })
        .or_else(|| header_str(headers, PREVIEW_TOKEN_HEADER))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn host_header_and_forwarded_proto_shape_the_request() {
        let headers = headers(&[
            ("host", "a.com:8080"),
            ("x-forwarded-proto", "HTTPS, http"),
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
        ]);
        let uri: Uri = "/api/spa?url=/".parse().expect("uri");
        let raw = raw_request(&headers, &uri, &Extensions::new(), Vec::new());

        assert_eq!(raw.scheme, "https");
        assert_eq!(raw.host, "a.com");
        assert_eq!(raw.port, Some(8080));
        assert_eq!(raw.remote_addr.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn missing_host_falls_back_to_localhost() {
        let uri: Uri = "/api/spa".parse().expect("uri");
        let raw = raw_request(&HeaderMap::new(), &uri, &Extensions::new(), Vec::new());
        assert_eq!(raw.scheme, "http");
        assert_eq!(raw.host, "localhost");
        assert_eq!(raw.port, None);
    }

    #[test]
    fn malformed_queries_answer_with_the_error_envelope() {
        let response = malformed_query(
            StatusCode::BAD_REQUEST,
            "Failed to deserialize query string".to_string(),
            &SpaOptions::default(),
        );

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("error report");
        assert_eq!(report.source, "infra::http::spa::get_data");
        assert_eq!(report.messages, vec!["Failed to deserialize query string".to_string()]);
        assert_eq!(
            response.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn identity_prefers_bearer_tokens() {
        let both = headers(&[
            ("authorization", "Bearer abc"),
            ("x-spa-preview-token", "def"),
        ]);
        assert_eq!(identity(&both).as_deref(), Some("abc"));

        let header_only = headers(&[("x-spa-preview-token", " def ")]);
        assert_eq!(identity(&header_only).as_deref(), Some("def"));

        let basic = headers(&[("authorization", "Basic abc")]);
        assert_eq!(identity(&basic), None);
    }
}
