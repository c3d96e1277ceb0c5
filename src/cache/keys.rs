//! Micro-cache key derivation.

use std::borrow::Cow;

use crate::application::arguments::RequestArguments;

/// Namespace shared by every micro-cache key. Clearing by this prefix
/// empties the whole micro-cache.
pub const CACHE_PREFIX: &str = "SpaMicroCache-";

/// Derive the micro-cache key of a request.
///
/// Plain concatenation, no hashing, so keys stay readable in logs. Parts keep
/// the caller's order. Free-text fields are escaped so no field can spill
/// into its neighbour.
pub fn cache_key(args: &RequestArguments) -> String {
    let parts = args
        .parts
        .iter()
        .map(|part| part.as_str())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{CACHE_PREFIX}{}-{}-{}-{}-{}-{}-{}-{}-{}-{}",
        args.page_id,
        args.site_id,
        escape(&args.url),
        args.is_preview,
        parts,
        escape(&args.protocol),
        escape(&args.host),
        args.port,
        args.nav_levels,
        args.nav_context,
    )
}

/// Percent-encode the separator (and `%` itself) inside a key field.
fn escape(field: &str) -> Cow<'_, str> {
    if !field.contains(['-', '%']) {
        return Cow::Borrowed(field);
    }
    let mut escaped = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            '-' => escaped.push_str("%2D"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}
