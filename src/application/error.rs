use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use spa_api_types::ErrorEnvelope;
use thiserror::Error;

use crate::{application::repos::RepoError, domain::error::DomainError, infra::error::InfraError};

/// Diagnostic record attached to error responses and picked up by the
/// response logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    /// Capture `error` and its whole `source()` chain.
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        Self {
            source,
            status,
            messages: error_chain(error),
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Messages of `error` followed by every error in its source chain.
pub fn error_chain(error: &dyn StdError) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

/// Failure raised by a single pipeline phase.
#[derive(Debug, Error)]
pub enum SpaError {
    #[error("site node {site_id} not found")]
    SiteNotFound { site_id: i64 },
    #[error("request state `{0}` has not been initialized")]
    MissingState(&'static str),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("{0}")]
    Custom(String),
}

impl SpaError {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

/// A phase failure tagged with the phase and group it escaped from.
#[derive(Debug, Error)]
#[error("SPA action `{phase}` in group `{group}` failed")]
pub struct ActionError {
    pub group: &'static str,
    pub phase: &'static str,
    #[source]
    pub source: SpaError,
}

impl ActionError {
    pub fn new(group: &'static str, phase: &'static str, source: SpaError) -> Self {
        Self {
            group,
            phase,
            source,
        }
    }
}

/// Error with a fixed public message, answered as a JSON envelope.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let envelope =
            ErrorEnvelope::new(self.status.as_u16(), Some(self.public_message.to_string()));
        let mut response = (self.status, Json(envelope)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Action(ActionError {
                source: SpaError::Repo(_),
                ..
            }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Action(_) | AppError::Infra(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Action(ActionError {
                source: SpaError::Repo(_),
                ..
            }) => "Service temporarily unavailable",
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure during request",
            AppError::Action(_) | AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let envelope = ErrorEnvelope::new(status.as_u16(), Some(message.to_string()));
        let mut response = (status, Json(envelope)).into_response();
        report.attach(&mut response);
        response
    }
}
