use std::collections::HashMap;
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use spa_api::cache::{
    CachedDataModel, ContentEvent, ContentEventKind, METRIC_CLEAR, METRIC_HIT, METRIC_MISS,
    MicroCache, MicroCacheConfig,
};
use spa_api_types::{DataModel, ResponseMeta};

fn cached(page_id: i64) -> CachedDataModel {
    CachedDataModel {
        data: DataModel {
            page_id,
            site_id: 1,
            content_generation: 0,
            meta: ResponseMeta::default(),
            site: None,
            navigation: None,
            content: None,
            is_cached: false,
            execute_time_ms: 2,
        },
        culture: None,
    }
}

fn counters(recorder: &DebuggingRecorder) -> HashMap<String, u64> {
    recorder
        .snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| match value {
            DebugValue::Counter(count) => Some((key.key().name().to_string(), count)),
            _ => None,
        })
        .fold(HashMap::new(), |mut totals, (name, count)| {
            *totals.entry(name).or_default() += count;
            totals
        })
}

#[test]
fn micro_cache_paths_emit_expected_counters() {
    let recorder = DebuggingRecorder::new();
    let cache = MicroCache::in_memory(MicroCacheConfig::default());
    let ttl = Duration::from_secs(60);

    metrics::with_local_recorder(&recorder, || {
        assert!(cache.try_read("SpaMicroCache-a").is_none());
        cache.write("SpaMicroCache-a".to_string(), || cached(2), ttl);
        assert!(cache.try_read("SpaMicroCache-a").is_some());
        assert!(cache.try_read("SpaMicroCache-a").is_some());
        cache.handle(&ContentEvent::new(ContentEventKind::Deleted, vec![2]));
        assert!(cache.try_read("SpaMicroCache-a").is_none());
    });

    let totals = counters(&recorder);
    assert_eq!(totals.get(METRIC_HIT), Some(&2));
    assert_eq!(totals.get(METRIC_MISS), Some(&2));
    assert_eq!(totals.get(METRIC_CLEAR), Some(&1));
}

#[test]
fn disabled_cache_records_nothing() {
    let recorder = DebuggingRecorder::new();
    let cache = MicroCache::in_memory(MicroCacheConfig {
        enabled: false,
        ..MicroCacheConfig::default()
    });

    metrics::with_local_recorder(&recorder, || {
        cache.write("SpaMicroCache-a".to_string(), || cached(2), Duration::from_secs(60));
        assert!(cache.try_read("SpaMicroCache-a").is_none());
    });

    let totals = counters(&recorder);
    assert!(!totals.contains_key(METRIC_HIT));
    assert!(!totals.contains_key(METRIC_MISS));
}
