#![allow(dead_code)]

use std::sync::Arc;

use spa_api::{
    application::{
        arguments::RawRequest,
        options::{Environment, SpaOptions},
        pipeline::{Pipeline, PipelineBuilder, SpaServices},
    },
    cache::{MicroCache, MicroCacheConfig},
    domain::resolver::DomainResolver,
    infra::{access::PreviewTokenGate, memory::MemoryContentStore},
};

pub const PREVIEW_TOKEN: &str = "preview-secret";

const FIXTURE: &str = include_str!("../../fixtures/site.json");

pub fn store() -> Arc<MemoryContentStore> {
    Arc::new(MemoryContentStore::from_json(FIXTURE).expect("fixture"))
}

pub fn services(options: SpaOptions) -> SpaServices {
    services_with_cache(
        options,
        Arc::new(MicroCache::in_memory(MicroCacheConfig::default())),
    )
}

pub fn services_with_cache(options: SpaOptions, cache: Arc<MicroCache>) -> SpaServices {
    let store = store();
    SpaServices {
        content: store.clone(),
        domains: store.clone(),
        redirects: store,
        access: Arc::new(PreviewTokenGate::new(Some(PREVIEW_TOKEN.to_string()))),
        cache,
        resolver: DomainResolver::new(),
        options,
    }
}

pub fn production() -> SpaOptions {
    SpaOptions::default()
}

pub fn development() -> SpaOptions {
    SpaOptions {
        environment: Environment::Development,
        ..SpaOptions::default()
    }
}

pub fn strict_statuses() -> SpaOptions {
    SpaOptions {
        overwrite_status_codes: false,
        ..SpaOptions::default()
    }
}

pub fn builder(options: SpaOptions) -> PipelineBuilder {
    Pipeline::builder(services(options))
}

pub fn pipeline(options: SpaOptions) -> Pipeline {
    builder(options).build().expect("pipeline")
}

pub fn request(url: &str) -> RawRequest {
    RawRequest::new("http", "a.com", None).with_query("url", url)
}
