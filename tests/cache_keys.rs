use insta::assert_snapshot;
use spa_api::application::{
    arguments::{RawRequest, RequestArguments},
    options::SpaOptions,
};

fn key(raw: RawRequest) -> String {
    RequestArguments::parse(&raw, &SpaOptions::default())
        .expect("arguments")
        .cache_key()
}

#[test]
fn snapshot_key_with_explicit_port_and_navigation() {
    let raw = RawRequest::new("https", "a.com", Some(8443))
        .with_query("url", "/da/om/")
        .with_query("parts", "site,content")
        .with_query("navLevels", "3")
        .with_query("navContext", "1");

    assert_snapshot!(
        key(raw),
        @"SpaMicroCache--1--1-/da/om/-false-Site,Content-https-a.com-8443-3-true"
    );
}

#[test]
fn snapshot_key_for_preview_urls() {
    let raw = RawRequest::new("http", "a.com", None).with_query("url", "/umbraco/preview/?id=42");

    assert_snapshot!(
        key(raw),
        @"SpaMicroCache-42--1-/umbraco/preview/?id=42-true-Content,Navigation,Site-http-a.com-80-1-false"
    );
}

#[test]
fn snapshot_key_with_application_host_override() {
    let raw = RawRequest::new("http", "internal", Some(8080))
        .with_query("url", "en/about/")
        .with_query("appHost", "a.com")
        .with_query("appProtocol", "https")
        .with_query("siteId", "1");

    assert_snapshot!(
        key(raw),
        @"SpaMicroCache--1-1-/en/about/-false-Content,Navigation,Site-https-a.com-8080-1-false"
    );
}

#[test]
fn dashes_in_free_text_fields_cannot_forge_another_key() {
    let shifted_host = RawRequest::new("http", "a.com", None)
        .with_query("url", "/x")
        .with_query("appHost", "h-false-Site-http-h")
        .with_query("parts", "site");
    let shifted_url = RawRequest::new("http", "a.com", None)
        .with_query("url", "/x-false-Site-http-h")
        .with_query("appHost", "h")
        .with_query("parts", "site");

    assert_ne!(key(shifted_host), key(shifted_url.clone()));
    assert_snapshot!(
        key(shifted_url),
        @"SpaMicroCache--1--1-/x%2Dfalse%2DSite%2Dhttp%2Dh-false-Site-http-h-80-1-false"
    );
}
