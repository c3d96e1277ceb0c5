//! The SPA request pipeline.
//!
//! A pipeline is a fixed list of [`ActionGroup`]s. Each group has a run
//! predicate and an ordered list of [`Phase`]s. Phases mutate the
//! [`RequestContext`] and either continue or terminate the request with a
//! response. A failing phase aborts the request with an [`ActionError`]
//! naming the phase and its group.

mod builder;
mod phases;

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use metrics::histogram;
use tracing::{Instrument, debug, error, info_span, trace};

use crate::{cache::MicroCache, domain::resolver::DomainResolver};

use super::{
    arguments::RawRequest,
    context::RequestContext,
    error::{ActionError, SpaError},
    options::SpaOptions,
    repos::{AccessGate, ContentRepo, DomainRepo, RedirectRepo},
    response::SpaResponse,
};

pub use builder::{PipelineBuildError, PipelineBuilder};
pub use phases::{DefaultPhase, html_error_hook};

pub const METRIC_PIPELINE_MS: &str = "spa_pipeline_ms";

pub const GROUP_INITIALIZE: &str = "initialize";
pub const GROUP_BUILD: &str = "build";
pub const GROUP_FINALIZE: &str = "finalize";

/// Result of a single phase.
#[derive(Debug)]
pub enum PhaseOutcome {
    Continue,
    /// Stop the pipeline and answer with this response.
    Terminate(SpaResponse),
}

#[async_trait]
pub trait Phase: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        ctx: &mut RequestContext,
        services: &SpaServices,
    ) -> Result<PhaseOutcome, SpaError>;
}

type PhaseFn =
    dyn Fn(&mut RequestContext, &SpaServices) -> Result<PhaseOutcome, SpaError> + Send + Sync;

/// A synchronous phase built from a closure.
pub struct FnPhase {
    name: &'static str,
    run: Box<PhaseFn>,
}

#[async_trait]
impl Phase for FnPhase {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(
        &self,
        ctx: &mut RequestContext,
        services: &SpaServices,
    ) -> Result<PhaseOutcome, SpaError> {
        (self.run)(ctx, services)
    }
}

/// Wrap a closure as a named phase.
pub fn phase_fn<F>(name: &'static str, run: F) -> Arc<dyn Phase>
where
    F: Fn(&mut RequestContext, &SpaServices) -> Result<PhaseOutcome, SpaError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnPhase {
        name,
        run: Box::new(run),
    })
}

pub type GroupPredicate = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// An ordered, conditionally skipped batch of phases.
#[derive(Clone)]
pub struct ActionGroup {
    name: &'static str,
    predicate: GroupPredicate,
    phases: Vec<Arc<dyn Phase>>,
}

impl ActionGroup {
    pub fn new(name: &'static str, predicate: GroupPredicate) -> Self {
        Self {
            name,
            predicate,
            phases: Vec::new(),
        }
    }

    pub fn always(name: &'static str) -> Self {
        Self::new(name, Arc::new(|_| true))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|phase| phase.name()).collect()
    }

    fn should_run(&self, ctx: &RequestContext) -> bool {
        (self.predicate)(ctx)
    }
}

/// Recoverable hook invoked when a phase fails. Returning a response
/// replaces the error.
pub type ErrorHook =
    Arc<dyn Fn(&RequestContext, &ActionError, &SpaServices) -> Option<SpaResponse> + Send + Sync>;

/// Collaborators shared by every request.
#[derive(Clone)]
pub struct SpaServices {
    pub content: Arc<dyn ContentRepo>,
    pub domains: Arc<dyn DomainRepo>,
    pub redirects: Arc<dyn RedirectRepo>,
    pub access: Arc<dyn AccessGate>,
    pub cache: Arc<MicroCache>,
    pub resolver: DomainResolver,
    pub options: SpaOptions,
}

pub struct Pipeline {
    groups: Vec<ActionGroup>,
    error_hook: Option<ErrorHook>,
    services: SpaServices,
}

impl Pipeline {
    /// Builder preloaded with the default groups and phases.
    pub fn builder(services: SpaServices) -> PipelineBuilder {
        PipelineBuilder::spa_defaults(services)
    }

    pub fn services(&self) -> &SpaServices {
        &self.services
    }

    pub fn groups(&self) -> &[ActionGroup] {
        &self.groups
    }

    pub async fn execute(&self, raw: RawRequest) -> Result<SpaResponse, ActionError> {
        let mut ctx = RequestContext::new(raw);
        self.execute_context(&mut ctx).await
    }

    /// Run every group against `ctx` and produce the final response.
    pub async fn execute_context(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<SpaResponse, ActionError> {
        let span = info_span!(
            "spa_pipeline",
            scheme = %ctx.raw.scheme,
            host = %ctx.raw.host,
            url = ctx.raw.query_value("url").unwrap_or("/"),
        );
        let started = Instant::now();

        let result = async {
            match self.run_groups(ctx).await {
                Ok(Some(response)) => Ok(response),
                Ok(None) => Ok(self.final_response(ctx)),
                Err(err) => self.recover(ctx, err),
            }
        }
        .instrument(span)
        .await;

        histogram!(METRIC_PIPELINE_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    async fn run_groups(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Option<SpaResponse>, ActionError> {
        for group in &self.groups {
            if !group.should_run(ctx) {
                trace!(group = group.name, "Skipping SPA action group");
                continue;
            }

            for phase in &group.phases {
                trace!(group = group.name, phase = phase.name(), "Running SPA phase");
                match phase.run(ctx, &self.services).await {
                    Ok(PhaseOutcome::Continue) => {}
                    Ok(PhaseOutcome::Terminate(response)) => {
                        debug!(
                            group = group.name,
                            phase = phase.name(),
                            status = response.status.as_u16(),
                            "SPA phase terminated the request"
                        );
                        return Ok(Some(response));
                    }
                    Err(source) => {
                        return Err(ActionError::new(group.name, phase.name(), source));
                    }
                }
            }
        }
        Ok(None)
    }

    fn final_response(&self, ctx: &RequestContext) -> SpaResponse {
        match ctx.data_model.clone() {
            Some(model) => SpaResponse::data(model, ctx.status, &self.services.options),
            None => {
                debug!("SPA pipeline produced neither a response nor a data model");
                SpaResponse::internal_error(&self.services.options)
            }
        }
    }

    fn recover(
        &self,
        ctx: &RequestContext,
        err: ActionError,
    ) -> Result<SpaResponse, ActionError> {
        error!(
            scheme = %ctx.raw.scheme,
            host = %ctx.raw.host,
            url = ctx.raw.query_value("url").unwrap_or("/"),
            group = err.group,
            phase = err.phase,
            error = %err.source,
            "SPA request failed"
        );

        match self
            .error_hook
            .as_ref()
            .and_then(|hook| hook(ctx, &err, &self.services))
        {
            Some(response) => Ok(response),
            None => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::http::StatusCode;

    use super::*;
    use crate::{
        application::repos::RepoError,
        cache::MicroCacheConfig,
        domain::{content::ContentNode, culture::Culture, domains::DomainRecord},
    };

    struct Nothing;

    #[async_trait]
    impl ContentRepo for Nothing {
        async fn get_content_by_id(&self, _id: i64) -> Result<Option<ContentNode>, RepoError> {
            Ok(None)
        }

        async fn get_preview_content_by_id(
            &self,
            _id: i64,
        ) -> Result<Option<ContentNode>, RepoError> {
            Ok(None)
        }

        async fn get_content_by_route(
            &self,
            _site_id: i64,
            _path: &str,
            _culture: Option<&Culture>,
        ) -> Result<Option<ContentNode>, RepoError> {
            Ok(None)
        }

        async fn get_children(&self, _id: i64) -> Result<Vec<ContentNode>, RepoError> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl DomainRepo for Nothing {
        async fn get_assigned_domains(
            &self,
            _node_id: i64,
        ) -> Result<Vec<DomainRecord>, RepoError> {
            Ok(Vec::new())
        }

        async fn get_all_domains(
            &self,
            _include_wildcards: bool,
        ) -> Result<Vec<DomainRecord>, RepoError> {
            Ok(Vec::new())
        }

        async fn is_published(&self, _domain: &DomainRecord) -> Result<bool, RepoError> {
            Ok(true)
        }

        async fn find_domain_by_name(
            &self,
            _name: &str,
        ) -> Result<Option<DomainRecord>, RepoError> {
            Ok(None)
        }

        async fn default_culture(&self) -> Result<Option<Culture>, RepoError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl RedirectRepo for Nothing {
        async fn get_most_recent_redirect(&self, _route: &str) -> Result<Option<i64>, RepoError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl AccessGate for Nothing {
        async fn is_authenticated(&self, _identity: Option<&str>) -> bool {
            false
        }
    }

    fn services() -> SpaServices {
        let nothing = Arc::new(Nothing);
        SpaServices {
            content: nothing.clone(),
            domains: nothing.clone(),
            redirects: nothing.clone(),
            access: nothing,
            cache: Arc::new(MicroCache::in_memory(MicroCacheConfig::default())),
            resolver: DomainResolver::new(),
            options: SpaOptions::default(),
        }
    }

    fn counter(name: &'static str, calls: &Arc<AtomicUsize>) -> Arc<dyn Phase> {
        let calls = calls.clone();
        phase_fn(name, move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(PhaseOutcome::Continue)
        })
    }

    fn raw() -> RawRequest {
        RawRequest::new("http", "a.com", None)
    }

    #[tokio::test]
    async fn terminate_skips_every_later_phase() {
        let spy = Arc::new(AtomicUsize::new(0));
        let pipeline = PipelineBuilder::new(services())
            .append(
                GROUP_INITIALIZE,
                phase_fn("stop", |_, services| {
                    Ok(PhaseOutcome::Terminate(SpaResponse::unauthorized(
                        &services.options,
                    )))
                }),
            )
            .append(GROUP_INITIALIZE, counter("after_stop", &spy))
            .append(GROUP_FINALIZE, counter("finalize_spy", &spy))
            .build()
            .expect("pipeline");

        let response = pipeline.execute(raw()).await.expect("response");
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(spy.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn build_group_is_skipped_once_a_data_model_exists() {
        let spy = Arc::new(AtomicUsize::new(0));
        let finalize = Arc::new(AtomicUsize::new(0));
        let pipeline = PipelineBuilder::new(services())
            .append(
                GROUP_INITIALIZE,
                phase_fn("fake_cache_hit", |ctx, _| {
                    ctx.data_model = Some(spa_api_types::DataModel {
                        page_id: 1,
                        site_id: 1,
                        content_generation: 0,
                        meta: Default::default(),
                        site: None,
                        navigation: None,
                        content: None,
                        is_cached: true,
                        execute_time_ms: 0,
                    });
                    Ok(PhaseOutcome::Continue)
                }),
            )
            .append(GROUP_BUILD, counter("build_spy", &spy))
            .append(GROUP_FINALIZE, counter("finalize_spy", &finalize))
            .build()
            .expect("pipeline");

        let response = pipeline.execute(raw()).await.expect("response");
        assert!(response.data_model().expect("data").is_cached);
        assert_eq!(spy.load(Ordering::SeqCst), 0);
        assert_eq!(finalize.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_wrapped_with_phase_identity() {
        let pipeline = PipelineBuilder::new(services())
            .append(
                GROUP_BUILD,
                phase_fn("explode", |_, _| Err(SpaError::custom("boom"))),
            )
            .build()
            .expect("pipeline");

        let err = pipeline.execute(raw()).await.expect_err("failure");
        assert_eq!(err.group, GROUP_BUILD);
        assert_eq!(err.phase, "explode");
        assert!(matches!(err.source, SpaError::Custom(ref message) if message == "boom"));
    }

    #[tokio::test]
    async fn error_hook_can_substitute_a_response() {
        let pipeline = PipelineBuilder::new(services())
            .append(
                GROUP_BUILD,
                phase_fn("explode", |_, _| Err(SpaError::custom("boom"))),
            )
            .on_error(Arc::new(|_, err, _| {
                Some(SpaResponse::html(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("<p>{}</p>", err.phase),
                ))
            }))
            .build()
            .expect("pipeline");

        let response = pipeline.execute(raw()).await.expect("response");
        assert_eq!(response.code(), 500);
    }

    #[tokio::test]
    async fn empty_pipeline_falls_back_to_internal_error() {
        let pipeline = PipelineBuilder::new(services()).build().expect("pipeline");
        let response = pipeline.execute(raw()).await.expect("response");
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.code(), 500);
    }
}
