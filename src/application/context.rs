//! Per-request state threaded through every pipeline phase.

use std::time::Instant;

use axum::http::StatusCode;
use spa_api_types::{ContentModel, DataModel};

use crate::domain::{content::ContentNode, culture::Culture, domains::DomainAndUri};

use super::{
    arguments::{RawRequest, RequestArguments},
    error::SpaError,
    models::ResolvedSite,
};

/// Mutable aggregate owned by one request. Never shared, never cached.
#[derive(Debug)]
pub struct RequestContext {
    pub raw: RawRequest,
    pub arguments: Option<RequestArguments>,
    pub domain: Option<DomainAndUri>,
    /// Resolved culture of the request.
    pub culture: Option<Culture>,
    pub site: Option<ContentNode>,
    /// Site id confirmed by `init_site`; `-1` until then.
    pub site_id: i64,
    /// Node holding culture specific settings; the site node by default.
    pub culture_node: Option<ContentNode>,
    pub content: Option<ContentNode>,
    pub site_model: Option<ResolvedSite>,
    pub content_model: Option<ContentModel>,
    pub data_model: Option<DataModel>,
    /// Logical status of the response (e.g. 404 for the not-found page).
    pub status: StatusCode,
    started: Instant,
}

impl RequestContext {
    pub fn new(raw: RawRequest) -> Self {
        Self {
            raw,
            arguments: None,
            domain: None,
            culture: None,
            site: None,
            site_id: -1,
            culture_node: None,
            content: None,
            site_model: None,
            content_model: None,
            data_model: None,
            status: StatusCode::OK,
            started: Instant::now(),
        }
    }

    pub fn arguments(&self) -> Result<&RequestArguments, SpaError> {
        self.arguments
            .as_ref()
            .ok_or(SpaError::MissingState("arguments"))
    }

    pub fn arguments_mut(&mut self) -> Result<&mut RequestArguments, SpaError> {
        self.arguments
            .as_mut()
            .ok_or(SpaError::MissingState("arguments"))
    }

    pub fn is_preview(&self) -> bool {
        self.arguments.as_ref().is_some_and(|args| args.is_preview)
    }

    /// Milliseconds since the context was created.
    pub fn elapsed_ms(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}
