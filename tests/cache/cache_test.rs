//! Result cache keyed by template, filter fingerprint and dataset version.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use dashq::cache::{fingerprint, DatasetVersion, ResultCache};
use dashq::filter::FilterSelection;
use dashq::gateway::{ExecutionError, ExecutionErrorKind};
use dashq::template::{ResultColumn, SemanticType};
use dashq::{Cell, EngineError, EngineResult, TabularResult};

fn rows(n: i64) -> TabularResult {
    let mut result = TabularResult::new(vec![ResultColumn::new("n", SemanticType::Integer)]);
    result.rows.push(vec![Cell::Integer(n)]);
    result
}

fn west() -> FilterSelection {
    FilterSelection::builder().region("West").build().unwrap()
}

#[test]
fn test_second_lookup_is_a_hit() {
    let cache = ResultCache::new(DatasetVersion::new());
    let runs = AtomicUsize::new(0);
    let produce = || -> EngineResult<TabularResult> {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok(rows(1))
    };

    let first = cache.get_or_compute("row_count", &west(), produce).unwrap();
    let second = cache.get_or_compute("row_count", &west(), produce).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
}

#[test]
fn test_equal_selections_share_an_entry() {
    let cache = ResultCache::new(DatasetVersion::new());
    let a = FilterSelection::builder()
        .regions(["West", "East"])
        .segment("Consumer")
        .build()
        .unwrap();
    let b = FilterSelection::builder()
        .segment("Consumer")
        .region("East")
        .region("West")
        .region("West")
        .build()
        .unwrap();
    assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());

    cache
        .get_or_compute("t", &a, || -> EngineResult<_> { Ok(rows(1)) })
        .unwrap();
    let hit = cache
        .get_or_compute("t", &b, || -> EngineResult<_> { Ok(rows(2)) })
        .unwrap();
    assert_eq!(hit.rows[0][0], Cell::Integer(1));
}

#[test]
fn test_key_includes_template_and_filter() {
    let cache = ResultCache::new(DatasetVersion::new());
    cache
        .get_or_compute("a", &west(), || -> EngineResult<_> { Ok(rows(1)) })
        .unwrap();
    cache
        .get_or_compute("b", &west(), || -> EngineResult<_> { Ok(rows(2)) })
        .unwrap();
    let all = cache
        .get_or_compute("a", &FilterSelection::all(), || -> EngineResult<_> {
            Ok(rows(3))
        })
        .unwrap();
    assert_eq!(all.rows[0][0], Cell::Integer(3));
    assert_eq!(cache.len(), 3);
}

#[test]
fn test_version_bump_recomputes_and_purges() {
    let version = DatasetVersion::new();
    let cache = ResultCache::new(version.clone());

    cache
        .get_or_compute("t", &west(), || -> EngineResult<_> { Ok(rows(1)) })
        .unwrap();
    cache
        .get_or_compute("u", &west(), || -> EngineResult<_> { Ok(rows(1)) })
        .unwrap();
    assert_eq!(cache.len(), 2);

    assert_eq!(version.bump(), 1);
    let fresh = cache
        .get_or_compute("t", &west(), || -> EngineResult<_> { Ok(rows(2)) })
        .unwrap();
    assert_eq!(fresh.rows[0][0], Cell::Integer(2));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().version, 1);
}

#[test]
fn test_failures_are_not_stored() {
    let cache = ResultCache::new(DatasetVersion::new());

    let err = cache
        .get_or_compute("t", &west(), || -> EngineResult<TabularResult> {
            Err(ExecutionError::timeout("too slow").into())
        })
        .unwrap_err();
    assert_eq!(err.execution_kind(), Some(ExecutionErrorKind::Timeout));
    assert!(cache.is_empty());

    let ok = cache
        .get_or_compute("t", &west(), || -> EngineResult<_> { Ok(rows(7)) })
        .unwrap();
    assert_eq!(ok.rows[0][0], Cell::Integer(7));
}

#[test]
fn test_concurrent_callers_share_one_computation() {
    const CALLERS: usize = 8;
    let cache = Arc::new(ResultCache::new(DatasetVersion::new()));
    let runs = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let runs = Arc::clone(&runs);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache
                    .get_or_compute("slow", &west(), || -> EngineResult<_> {
                        runs.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok(rows(42))
                    })
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<Arc<TabularResult>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, CALLERS as u64 - 1);
}

#[test]
fn test_waiters_recompute_after_failure() {
    let cache = ResultCache::new(DatasetVersion::new());
    let first: Result<_, EngineError> = cache.get_or_compute("t", &west(), || {
        Err(ExecutionError::connection_lost("gone").into())
    });
    assert!(first.is_err());

    let runs = AtomicUsize::new(0);
    for _ in 0..2 {
        cache
            .get_or_compute("t", &west(), || -> EngineResult<_> {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(rows(1))
            })
            .unwrap();
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_disabled_cache_always_computes() {
    let cache = ResultCache::disabled(DatasetVersion::new());
    let runs = AtomicUsize::new(0);
    for _ in 0..3 {
        cache
            .get_or_compute("t", &west(), || -> EngineResult<_> {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(rows(1))
            })
            .unwrap();
    }
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert!(cache.is_empty());
    assert!(!cache.is_enabled());
}

#[test]
fn test_invalidate_all() {
    let cache = ResultCache::new(DatasetVersion::new());
    cache
        .get_or_compute("t", &west(), || -> EngineResult<_> { Ok(rows(1)) })
        .unwrap();
    cache.invalidate_all();
    assert!(cache.is_empty());
}
