use std::{process, sync::Arc};

use spa_api::{
    application::{
        arguments::RawRequest,
        error::AppError,
        options::SpaOptions,
        pipeline::{Pipeline, SpaServices},
        response::{SpaBody, SpaResponse},
    },
    cache::{MicroCache, MicroCacheConfig},
    config,
    domain::resolver::DomainResolver,
    infra::{
        access::PreviewTokenGate,
        error::InfraError,
        http::{self, AppState},
        memory::MemoryContentStore,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pipeline = build_pipeline(&settings).await?;
    let router = http::build_router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "SPA API listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let pipeline = build_pipeline(&settings).await?;

    let mut raw = RawRequest::new(args.protocol, args.host, None)
        .with_query("url", args.url)
        .with_query("cache", "false");
    if let Some(page_id) = args.page_id {
        raw = raw.with_query("pageId", page_id.to_string());
    }
    if let Some(culture) = args.culture {
        raw = raw.with_query("culture", culture);
    }
    if let Some(parts) = args.parts {
        raw = raw.with_query("parts", parts);
    }

    let response = pipeline.execute(raw).await?;
    println!("{}", render_body(&response)?);
    Ok(())
}

fn render_body(response: &SpaResponse) -> Result<String, AppError> {
    let encoded = match &response.body {
        SpaBody::Data(model) => serde_json::to_string_pretty(model),
        SpaBody::Envelope(envelope) => serde_json::to_string_pretty(envelope),
        SpaBody::Html(html) => return Ok(html.clone()),
    };
    encoded.map_err(|err| AppError::unexpected(format!("failed to encode response: {err}")))
}

async fn build_pipeline(settings: &config::Settings) -> Result<Pipeline, AppError> {
    let store = match settings.content.fixture.as_deref() {
        Some(path) => {
            let store = MemoryContentStore::load(path).await.map_err(AppError::from)?;
            info!(
                fixture = %path.display(),
                nodes = store.node_count(),
                "Loaded content fixture"
            );
            store
        }
        None => {
            warn!("No content fixture configured; serving an empty content tree");
            MemoryContentStore::default()
        }
    };
    let store = Arc::new(store);

    let services = SpaServices {
        content: store.clone(),
        domains: store.clone(),
        redirects: store,
        access: Arc::new(PreviewTokenGate::new(settings.spa.preview_token.clone())),
        cache: Arc::new(MicroCache::in_memory(MicroCacheConfig::from(&settings.cache))),
        resolver: DomainResolver::new(),
        options: SpaOptions::from(&settings.spa),
    };

    Pipeline::builder(services)
        .build()
        .map_err(|err| AppError::unexpected(format!("failed to assemble pipeline: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
