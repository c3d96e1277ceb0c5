//! Terminal responses produced by the pipeline.

use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use spa_api_types::{DataModel, ErrorEnvelope, RedirectData};
use tracing::warn;

use super::options::SpaOptions;

/// Status sent on the wire when redirects are not folded into 200.
pub const TEAPOT: StatusCode = StatusCode::IM_A_TEAPOT;

const REDIRECT_MESSAGE: &str = "Page has moved";

#[derive(Debug, Clone, PartialEq)]
pub enum SpaBody {
    Data(Box<DataModel>),
    Envelope(ErrorEnvelope),
    Html(String),
}

/// A response ready to be sent: the wire status and its body.
///
/// The logical status lives in the body (`meta.code`); `status` may differ
/// from it when status codes are overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaResponse {
    pub status: StatusCode,
    pub body: SpaBody,
}

impl SpaResponse {
    /// Successful data response. `status` is stamped into `meta.code`.
    pub fn data(mut model: DataModel, status: StatusCode, options: &SpaOptions) -> Self {
        model.meta.code = status.as_u16();
        Self {
            status: wire_status(status, options),
            body: SpaBody::Data(Box::new(model)),
        }
    }

    pub fn error(status: StatusCode, message: Option<&str>, options: &SpaOptions) -> Self {
        let envelope = ErrorEnvelope::new(status.as_u16(), message.map(str::to_string));
        Self {
            status: wire_status(status, options),
            body: SpaBody::Envelope(envelope),
        }
    }

    /// Generic 500 envelope used when the pipeline produced nothing.
    pub fn internal_error(options: &SpaOptions) -> Self {
        Self::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            Some("Internal server error"),
            options,
        )
    }

    pub fn unauthorized(options: &SpaOptions) -> Self {
        Self::error(
            StatusCode::UNAUTHORIZED,
            Some("User not authenticated."),
            options,
        )
    }

    /// Redirect envelope: 301 when `permanent`, 307 otherwise.
    pub fn redirect(url: &str, permanent: bool, options: &SpaOptions) -> Self {
        let code = if permanent {
            StatusCode::MOVED_PERMANENTLY
        } else {
            StatusCode::TEMPORARY_REDIRECT
        };
        let data = RedirectData {
            url: url.to_string(),
            permanent,
        };
        let data = serde_json::to_value(data).unwrap_or_else(|err| {
            warn!(error = %err, "Failed to serialize redirect data");
            serde_json::Value::Null
        });
        let envelope =
            ErrorEnvelope::new(code.as_u16(), Some(REDIRECT_MESSAGE.to_string())).with_data(data);

        Self {
            status: if options.overwrite_status_codes {
                StatusCode::OK
            } else {
                TEAPOT
            },
            body: SpaBody::Envelope(envelope),
        }
    }

    pub fn html(status: StatusCode, html: String) -> Self {
        Self {
            status,
            body: SpaBody::Html(html),
        }
    }

    /// Status carried in the body, or the wire status for HTML bodies.
    pub fn code(&self) -> u16 {
        match &self.body {
            SpaBody::Data(model) => model.meta.code,
            SpaBody::Envelope(envelope) => envelope.meta.code,
            SpaBody::Html(_) => self.status.as_u16(),
        }
    }

    pub fn data_model(&self) -> Option<&DataModel> {
        match &self.body {
            SpaBody::Data(model) => Some(model),
            _ => None,
        }
    }

    pub fn envelope(&self) -> Option<&ErrorEnvelope> {
        match &self.body {
            SpaBody::Envelope(envelope) => Some(envelope),
            _ => None,
        }
    }
}

/// Fold 404/301/307 into 200 when status codes are overwritten.
pub fn wire_status(status: StatusCode, options: &SpaOptions) -> StatusCode {
    let foldable = matches!(
        status,
        StatusCode::NOT_FOUND | StatusCode::MOVED_PERMANENTLY | StatusCode::TEMPORARY_REDIRECT
    );
    if options.overwrite_status_codes && foldable {
        StatusCode::OK
    } else {
        status
    }
}

impl IntoResponse for SpaResponse {
    fn into_response(self) -> Response {
        match self.body {
            SpaBody::Data(model) => (self.status, Json(model)).into_response(),
            SpaBody::Envelope(envelope) => (self.status, Json(envelope)).into_response(),
            SpaBody::Html(html) => (self.status, Html(html)).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use spa_api_types::ResponseMeta;

    use super::*;

    fn model() -> DataModel {
        DataModel {
            page_id: 1,
            site_id: 1,
            content_generation: 0,
            meta: ResponseMeta::default(),
            site: None,
            navigation: None,
            content: None,
            is_cached: false,
            execute_time_ms: 0,
        }
    }

    fn strict() -> SpaOptions {
        SpaOptions {
            overwrite_status_codes: false,
            ..SpaOptions::default()
        }
    }

    #[test]
    fn not_found_is_folded_into_ok_when_overwriting() {
        let response = SpaResponse::data(model(), StatusCode::NOT_FOUND, &SpaOptions::default());
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.code(), 404);

        let response = SpaResponse::data(model(), StatusCode::NOT_FOUND, &strict());
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_is_never_folded() {
        let response = SpaResponse::unauthorized(&SpaOptions::default());
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        let envelope = response.envelope().expect("envelope");
        assert_eq!(envelope.meta.error.as_deref(), Some("User not authenticated."));
    }

    #[test]
    fn redirects_use_teapot_without_overwrite() {
        let response = SpaResponse::redirect("/new/", false, &strict());
        assert_eq!(response.status, TEAPOT);
        assert_eq!(response.code(), 307);

        let response = SpaResponse::redirect("/new/", true, &SpaOptions::default());
        assert_eq!(response.status, StatusCode::OK);
        let envelope = response.envelope().expect("envelope");
        assert_eq!(envelope.meta.code, 301);
        assert_eq!(envelope.data["url"], "/new/");
        assert_eq!(envelope.data["permanent"], true);
    }
}
