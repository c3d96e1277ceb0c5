//! The built-in phases of the SPA pipeline.

use askama::Template;
use async_trait::async_trait;
use axum::http::StatusCode;
use spa_api_types::{ApiPart, DataModel, ResponseMeta};
use tracing::{debug, warn};

use crate::{
    application::{
        arguments::RequestArguments,
        context::RequestContext,
        domains::{domain_for_node, find_domain},
        error::{ActionError, SpaError, error_chain},
        models::{ResolvedSite, build_navigation, content_model},
        repos::DomainRepo,
        response::SpaResponse,
    },
    cache::CachedDataModel,
    domain::{content::ContentNode, domains::DomainAndUri},
};

use super::{GROUP_BUILD, GROUP_FINALIZE, GROUP_INITIALIZE, Phase, PhaseOutcome, SpaServices};

type PhaseResult = Result<PhaseOutcome, SpaError>;

/// Every phase the pipeline ships with.
///
/// [`DefaultPhase::ALL`] lists the default pipeline in execution order. The
/// trailing slash phases are opt-in and have to be inserted explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultPhase {
    InitArguments,
    FindDomainAndCulture,
    UpdateArguments,
    ValidatePreviewAccess,
    ReadFromCache,
    InitSite,
    PostInitSite,
    PreContentLookup,
    ContentLookup,
    PostContentLookup,
    PreSetupCulture,
    SetupCulture,
    PostSetupCulture,
    InitSiteModel,
    HandleNotFound,
    HandleOutboundRedirects,
    PreInitModels,
    InitContentModel,
    InitDataModel,
    InitNavigationModel,
    InitCustomModels,
    PostInitModels,
    PrePushToCache,
    PushToCache,
    Finalize,
    AddTrailingSlash,
    RemoveTrailingSlash,
}

impl DefaultPhase {
    pub const ALL: [DefaultPhase; 25] = [
        Self::InitArguments,
        Self::FindDomainAndCulture,
        Self::UpdateArguments,
        Self::ValidatePreviewAccess,
        Self::ReadFromCache,
        Self::InitSite,
        Self::PostInitSite,
        Self::PreContentLookup,
        Self::ContentLookup,
        Self::PostContentLookup,
        Self::PreSetupCulture,
        Self::SetupCulture,
        Self::PostSetupCulture,
        Self::InitSiteModel,
        Self::HandleNotFound,
        Self::HandleOutboundRedirects,
        Self::PreInitModels,
        Self::InitContentModel,
        Self::InitDataModel,
        Self::InitNavigationModel,
        Self::InitCustomModels,
        Self::PostInitModels,
        Self::PrePushToCache,
        Self::PushToCache,
        Self::Finalize,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitArguments => "init_arguments",
            Self::FindDomainAndCulture => "find_domain_and_culture",
            Self::UpdateArguments => "update_arguments",
            Self::ValidatePreviewAccess => "validate_preview_access",
            Self::ReadFromCache => "read_from_cache",
            Self::InitSite => "init_site",
            Self::PostInitSite => "post_init_site",
            Self::PreContentLookup => "pre_content_lookup",
            Self::ContentLookup => "content_lookup",
            Self::PostContentLookup => "post_content_lookup",
            Self::PreSetupCulture => "pre_setup_culture",
            Self::SetupCulture => "setup_culture",
            Self::PostSetupCulture => "post_setup_culture",
            Self::InitSiteModel => "init_site_model",
            Self::HandleNotFound => "handle_not_found",
            Self::HandleOutboundRedirects => "handle_outbound_redirects",
            Self::PreInitModels => "pre_init_models",
            Self::InitContentModel => "init_content_model",
            Self::InitDataModel => "init_data_model",
            Self::InitNavigationModel => "init_navigation_model",
            Self::InitCustomModels => "init_custom_models",
            Self::PostInitModels => "post_init_models",
            Self::PrePushToCache => "pre_push_to_cache",
            Self::PushToCache => "push_to_cache",
            Self::Finalize => "finalize",
            Self::AddTrailingSlash => "add_trailing_slash",
            Self::RemoveTrailingSlash => "remove_trailing_slash",
        }
    }

    /// Group the phase belongs to in the default pipeline.
    pub fn group(self) -> &'static str {
        match self {
            Self::InitArguments
            | Self::FindDomainAndCulture
            | Self::UpdateArguments
            | Self::ValidatePreviewAccess
            | Self::ReadFromCache
            | Self::AddTrailingSlash
            | Self::RemoveTrailingSlash => GROUP_INITIALIZE,
            Self::Finalize => GROUP_FINALIZE,
            _ => GROUP_BUILD,
        }
    }
}

#[async_trait]
impl Phase for DefaultPhase {
    fn name(&self) -> &'static str {
        self.as_str()
    }

    async fn run(&self, ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
        match self {
            Self::InitArguments => init_arguments(ctx, services),
            Self::FindDomainAndCulture => find_domain_and_culture(ctx, services).await,
            Self::UpdateArguments => update_arguments(ctx, services).await,
            Self::ValidatePreviewAccess => validate_preview_access(ctx, services).await,
            Self::ReadFromCache => read_from_cache(ctx, services),
            Self::InitSite => init_site(ctx, services).await,
            Self::ContentLookup => content_lookup(ctx, services).await,
            Self::SetupCulture => setup_culture(ctx),
            Self::InitSiteModel => init_site_model(ctx, services).await,
            Self::HandleNotFound => handle_not_found(ctx, services).await,
            Self::HandleOutboundRedirects => handle_outbound_redirects(ctx, services),
            Self::InitContentModel => init_content_model(ctx),
            Self::InitDataModel => init_data_model(ctx, services),
            Self::InitNavigationModel => init_navigation_model(ctx, services).await,
            Self::PrePushToCache => pre_push_to_cache(ctx),
            Self::PushToCache => push_to_cache(ctx, services),
            Self::AddTrailingSlash => trailing_slash_redirect(ctx, services, true),
            Self::RemoveTrailingSlash => trailing_slash_redirect(ctx, services, false),
            Self::PostInitSite
            | Self::PreContentLookup
            | Self::PostContentLookup
            | Self::PreSetupCulture
            | Self::PostSetupCulture
            | Self::PreInitModels
            | Self::InitCustomModels
            | Self::PostInitModels
            | Self::Finalize => Ok(PhaseOutcome::Continue),
        }
    }
}

fn init_arguments(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    ctx.arguments = Some(RequestArguments::parse(&ctx.raw, &services.options)?);
    Ok(PhaseOutcome::Continue)
}

async fn find_domain_and_culture(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    let args = ctx.arguments()?;
    let uri = args.uri.clone();
    let requested = args.culture.clone();
    let (page_id, is_preview) = (args.page_id, args.is_preview);

    let resolution = find_domain(
        services.domains.as_ref(),
        &services.resolver,
        &uri,
        requested.as_ref(),
    )
    .await?;
    ctx.domain = resolution.domain;
    ctx.culture = resolution.culture;

    if page_id > 0 {
        if let Some(node) = lookup_by_id(services, page_id, is_preview).await? {
            let assigned = domain_for_node(
                services.content.as_ref(),
                services.domains.as_ref(),
                &services.resolver,
                &node,
                requested.as_ref(),
            )
            .await?;
            if let Some(domain) = assigned {
                if let Some(culture) = domain.culture() {
                    ctx.culture = Some(culture.clone());
                }
                ctx.domain = Some(domain);
            }
        }
    }

    debug!(
        domain = ctx.domain.as_ref().map(|domain| domain.domain.name.as_str()),
        culture = ctx.culture.as_ref().map(|culture| culture.as_str()),
        "Resolved SPA domain"
    );
    Ok(PhaseOutcome::Continue)
}

async fn update_arguments(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    let (page_id, is_preview) = {
        let args = ctx.arguments()?;
        (args.page_id, args.is_preview)
    };

    if page_id > 0 {
        if let Some(node) = lookup_by_id(services, page_id, is_preview).await? {
            ctx.arguments_mut()?.set_url(&node.url)?;
        }
    }

    if ctx.arguments()?.site_id <= 0 {
        let site_id = match &ctx.domain {
            Some(domain) => Some(domain.content_id()),
            None => site_id_by_host(services.domains.as_ref(), ctx.arguments()?).await?,
        };
        if let Some(site_id) = site_id {
            ctx.arguments_mut()?.site_id = site_id;
        }
    }

    Ok(PhaseOutcome::Continue)
}

async fn site_id_by_host(
    domains: &dyn DomainRepo,
    args: &RequestArguments,
) -> Result<Option<i64>, SpaError> {
    if !args.is_default_port {
        let name = format!("{}:{}", args.host, args.port);
        if let Some(domain) = domains.find_domain_by_name(&name).await? {
            return Ok(Some(domain.content_id));
        }
    }
    Ok(domains
        .find_domain_by_name(&args.host)
        .await?
        .map(|domain| domain.content_id))
}

async fn validate_preview_access(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    if !ctx.is_preview() {
        return Ok(PhaseOutcome::Continue);
    }
    if services
        .access
        .is_authenticated(ctx.raw.identity.as_deref())
        .await
    {
        return Ok(PhaseOutcome::Continue);
    }

    debug!("Preview requested without an authenticated identity");
    Ok(PhaseOutcome::Terminate(SpaResponse::unauthorized(
        &services.options,
    )))
}

fn read_from_cache(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    let args = ctx.arguments()?;
    if !args.enable_caching {
        return Ok(PhaseOutcome::Continue);
    }

    let Some(CachedDataModel { mut data, culture }) = services.cache.try_read(&args.cache_key())
    else {
        return Ok(PhaseOutcome::Continue);
    };

    data.is_cached = true;
    data.execute_time_ms = ctx.elapsed_ms();
    ctx.culture = culture;
    ctx.status = StatusCode::from_u16(data.meta.code).unwrap_or(StatusCode::OK);
    ctx.data_model = Some(data);
    Ok(PhaseOutcome::Continue)
}

async fn init_site(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    let site_id = ctx.arguments()?.site_id;
    let site = services
        .content
        .get_content_by_id(site_id)
        .await?
        .ok_or(SpaError::SiteNotFound { site_id })?;

    ctx.site_id = site.id;
    ctx.site = Some(site);
    Ok(PhaseOutcome::Continue)
}

async fn content_lookup(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    if ctx.content.is_some() {
        return Ok(PhaseOutcome::Continue);
    }

    let args = ctx.arguments()?;
    let is_preview = args.is_preview;
    let content = if is_preview {
        services
            .content
            .get_preview_content_by_id(args.page_id)
            .await?
    } else if args.page_id > 0 {
        services.content.get_content_by_id(args.page_id).await?
    } else {
        let path = route_path(&args.url, ctx.domain.as_ref());
        services
            .content
            .get_content_by_route(ctx.site_id, &path, ctx.culture.as_ref())
            .await?
    };

    let content = match content.as_ref().and_then(|node| node.internal_redirect_id) {
        Some(target) => {
            debug!(target, "Following internal redirect");
            lookup_by_id(services, target, is_preview).await?
        }
        None => content,
    };

    ctx.content = content;
    Ok(PhaseOutcome::Continue)
}

fn setup_culture(ctx: &mut RequestContext) -> PhaseResult {
    if ctx.culture_node.is_none() {
        ctx.culture_node = ctx.site.clone();
    }
    Ok(PhaseOutcome::Continue)
}

async fn init_site_model(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    let site = ctx.site.as_ref().ok_or(SpaError::MissingState("site"))?;
    let model =
        ResolvedSite::resolve(services.content.as_ref(), site, ctx.culture_node.as_ref()).await?;
    ctx.site_model = Some(model);
    Ok(PhaseOutcome::Continue)
}

async fn handle_not_found(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    if ctx.content.is_some() {
        return Ok(PhaseOutcome::Continue);
    }

    let url = ctx.arguments()?.url.as_str();
    let path = url.split('?').next().unwrap_or(url);
    let route = format!("{}{}", ctx.site_id, path.trim_end_matches('/'));

    if let Some(target_id) = services.redirects.get_most_recent_redirect(&route).await? {
        if let Some(target) = services.content.get_content_by_id(target_id).await? {
            debug!(route = %route, target = target.id, "Inbound redirect matched");
            return Ok(PhaseOutcome::Terminate(SpaResponse::redirect(
                &target.url,
                true,
                &services.options,
            )));
        }
    }

    ctx.status = StatusCode::NOT_FOUND;
    ctx.content = ctx
        .site_model
        .as_ref()
        .and_then(|site| site.not_found_page.clone());
    debug!(
        route = %route,
        not_found_page = ctx.content.as_ref().map(|node| node.id),
        "SPA content not found"
    );
    Ok(PhaseOutcome::Continue)
}

fn handle_outbound_redirects(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    let redirect = ctx
        .content
        .as_ref()
        .and_then(|node| node.outbound_redirect.as_ref());

    Ok(match redirect {
        Some(redirect) => PhaseOutcome::Terminate(SpaResponse::redirect(
            &redirect.url,
            redirect.permanent,
            &services.options,
        )),
        None => PhaseOutcome::Continue,
    })
}

fn init_content_model(ctx: &mut RequestContext) -> PhaseResult {
    if ctx.arguments()?.has_part(ApiPart::Content) {
        ctx.content_model = ctx
            .content
            .as_ref()
            .map(|node| content_model(node, ctx.culture.as_ref()));
    }
    Ok(PhaseOutcome::Continue)
}

fn init_data_model(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    let args = ctx.arguments()?;
    let site = if args.has_part(ApiPart::Site) {
        ctx.site_model.as_ref().map(ResolvedSite::to_model)
    } else {
        None
    };
    let content = if args.has_part(ApiPart::Content) {
        ctx.content_model.clone()
    } else {
        None
    };

    ctx.data_model = Some(DataModel {
        page_id: ctx.content.as_ref().map_or(-1, |node| node.id),
        site_id: ctx.site_id,
        content_generation: services.cache.generation(),
        meta: ResponseMeta {
            code: ctx.status.as_u16(),
        },
        site,
        navigation: None,
        content,
        is_cached: false,
        execute_time_ms: -1,
    });
    Ok(PhaseOutcome::Continue)
}

async fn init_navigation_model(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    let args = ctx.arguments()?;
    if !args.has_part(ApiPart::Navigation) {
        return Ok(PhaseOutcome::Continue);
    }

    let levels = args.nav_levels;
    let current: Option<&ContentNode> = if args.nav_context {
        ctx.content.as_ref()
    } else {
        None
    };
    let site = ctx.site.as_ref().ok_or(SpaError::MissingState("site"))?;
    let navigation = build_navigation(services.content.as_ref(), site, levels, current).await?;

    ctx.data_model
        .as_mut()
        .ok_or(SpaError::MissingState("data_model"))?
        .navigation = Some(navigation);
    Ok(PhaseOutcome::Continue)
}

fn pre_push_to_cache(ctx: &mut RequestContext) -> PhaseResult {
    let elapsed = ctx.elapsed_ms();
    if let Some(data) = ctx.data_model.as_mut() {
        if data.execute_time_ms < 0 {
            data.execute_time_ms = elapsed;
        }
    }
    Ok(PhaseOutcome::Continue)
}

fn push_to_cache(ctx: &mut RequestContext, services: &SpaServices) -> PhaseResult {
    let args = ctx.arguments()?;
    if !args.enable_caching {
        return Ok(PhaseOutcome::Continue);
    }
    let Some(data) = ctx.data_model.clone() else {
        return Ok(PhaseOutcome::Continue);
    };

    let culture = ctx.culture.clone();
    services.cache.write(
        args.cache_key(),
        move || CachedDataModel { data, culture },
        services.cache.ttl(),
    );
    Ok(PhaseOutcome::Continue)
}

fn trailing_slash_redirect(
    ctx: &mut RequestContext,
    services: &SpaServices,
    add: bool,
) -> PhaseResult {
    let args = ctx.arguments()?;
    if args.is_preview {
        return Ok(PhaseOutcome::Continue);
    }

    let target = if add {
        with_trailing_slash(&args.url)
    } else {
        without_trailing_slash(&args.url)
    };
    Ok(match target {
        Some(target) => {
            debug!(from = %args.url, to = %target, "Trailing slash redirect");
            PhaseOutcome::Terminate(SpaResponse::redirect(&target, true, &services.options))
        }
        None => PhaseOutcome::Continue,
    })
}

/// `url` with a `/` appended to its path, or `None` when it already has one.
fn with_trailing_slash(url: &str) -> Option<String> {
    let (path, query) = split_query(url);
    if path.ends_with('/') {
        return None;
    }
    Some(match query {
        Some(query) => format!("{path}/?{query}"),
        None => format!("{path}/"),
    })
}

/// `url` with trailing slashes removed from its path, or `None` when there
/// are none to remove. The root path is left alone.
fn without_trailing_slash(url: &str) -> Option<String> {
    let (path, query) = split_query(url);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() || trimmed == path {
        return None;
    }
    Some(match query {
        Some(query) => format!("{trimmed}?{query}"),
        None => trimmed.to_string(),
    })
}

fn split_query(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// Path used for route lookups: the query is dropped and the path prefix of
/// the matched domain (e.g. `/da` for `a.com/da`) is stripped.
fn route_path(url: &str, domain: Option<&DomainAndUri>) -> String {
    let (path, _) = split_query(url);
    let prefix = match domain.map(DomainAndUri::path) {
        Some(prefix) if prefix != "/" => prefix.trim_end_matches('/'),
        _ => return path.to_string(),
    };

    match path.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => {
            let rest = &path[prefix.len()..];
            if rest.is_empty() {
                "/".to_string()
            } else if rest.starts_with('/') {
                rest.to_string()
            } else {
                path.to_string()
            }
        }
        _ => path.to_string(),
    }
}

async fn lookup_by_id(
    services: &SpaServices,
    id: i64,
    preview: bool,
) -> Result<Option<ContentNode>, SpaError> {
    let node = if preview {
        services.content.get_preview_content_by_id(id).await?
    } else {
        services.content.get_content_by_id(id).await?
    };
    Ok(node)
}

struct Row {
    label: &'static str,
    value: String,
}

#[derive(Template)]
#[template(path = "spa_error.html")]
struct DiagnosticPage<'a> {
    version: &'static str,
    remote_addr: &'a str,
    user_agent: &'a str,
    accept: &'a str,
    arguments: Vec<Row>,
    environment: &'static str,
    overwrite_status_codes: bool,
    group: &'static str,
    phase: &'static str,
    errors: Vec<String>,
}

fn argument_rows(args: &RequestArguments) -> Vec<Row> {
    let parts = args
        .parts()
        .iter()
        .map(|part| part.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let culture = args
        .culture
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();

    let rows: [(&'static str, String); 14] = [
        ("Page Id", args.page_id.to_string()),
        ("Site Id", args.site_id.to_string()),
        ("Url", args.url.clone()),
        ("Culture", culture),
        ("Is Preview", args.is_preview.to_string()),
        ("Protocol", args.protocol.clone()),
        ("Host", args.host.clone()),
        ("Port", args.port.to_string()),
        ("Parts", parts),
        ("Navigation Levels", args.nav_levels.to_string()),
        ("Navigation Context", args.nav_context.to_string()),
        ("Cache Key", args.cache_key()),
        ("Enable Caching", args.enable_caching.to_string()),
        ("Show Html Errors", args.show_html_errors.to_string()),
    ];
    rows.into_iter()
        .map(|(label, value)| Row { label, value })
        .collect()
}

/// Default error hook: renders an HTML diagnostic page for development
/// clients that accept HTML and declines otherwise.
pub fn html_error_hook(
    ctx: &RequestContext,
    err: &ActionError,
    services: &SpaServices,
) -> Option<SpaResponse> {
    let accept = ctx.raw.accept.as_deref().unwrap_or_default();
    if !services.options.environment.is_development() || !accept.contains("text/html") {
        return None;
    }

    let page = DiagnosticPage {
        version: env!("CARGO_PKG_VERSION"),
        remote_addr: ctx.raw.remote_addr.as_deref().unwrap_or_default(),
        user_agent: ctx.raw.user_agent.as_deref().unwrap_or_default(),
        accept,
        arguments: ctx.arguments.as_ref().map(argument_rows).unwrap_or_default(),
        environment: services.options.environment.as_str(),
        overwrite_status_codes: services.options.overwrite_status_codes,
        group: err.group,
        phase: err.phase,
        errors: error_chain(err),
    };

    match page.render() {
        Ok(html) => Some(SpaResponse::html(StatusCode::INTERNAL_SERVER_ERROR, html)),
        Err(render_err) => {
            warn!(error = %render_err, "Failed to render SPA diagnostic page");
            None
        }
    }
}
