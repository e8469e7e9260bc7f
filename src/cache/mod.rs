//! In-process result cache.
//!
//! Memoizes typed results per session so that re-rendering a dashboard with
//! an unchanged selection does not hit the store again.
//!
//! # Design
//!
//! - One `OnceCell` per key: the first caller produces, concurrent callers
//!   for the same key block until it finishes
//! - Failures are never stored; the next caller produces again
//! - Versioned: keys carry the dataset version, and entries from older
//!   versions are purged the first time a newer version is observed
//!
//! # Key Format
//!
//! ```text
//! (template name, sha256(json(FilterSelection)), dataset version)
//! ```

mod fingerprint;
pub use fingerprint::{compute_hash, fingerprint};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::filter::FilterSelection;
use crate::result::TabularResult;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to fingerprint filter selection: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Shared, monotonically increasing stamp of the loaded dataset.
///
/// Clones share the same counter. The data-loading collaborator calls
/// [`bump`](Self::bump) after replacing the data.
#[derive(Debug, Clone, Default)]
pub struct DatasetVersion(Arc<AtomicU64>);

impl DatasetVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Advance the version, returning the new value.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub template: String,
    pub fingerprint: String,
    pub version: u64,
}

/// A stored result. Replaced wholesale, never updated.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub rows: Arc<TabularResult>,
    pub created_at: SystemTime,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Number of stored results.
    pub entries: usize,
    pub version: u64,
}

/// Memoizes template results by (template, filter, dataset version).
#[derive(Debug)]
pub struct ResultCache {
    entries: DashMap<CacheKey, Arc<OnceCell<CacheEntry>>>,
    version: DatasetVersion,
    observed: AtomicU64,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(version: DatasetVersion) -> Self {
        let observed = AtomicU64::new(version.current());
        Self {
            entries: DashMap::new(),
            version,
            observed,
            enabled: true,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache that stores nothing; every call runs the producer.
    pub fn disabled(version: DatasetVersion) -> Self {
        Self {
            enabled: false,
            ..Self::new(version)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn version(&self) -> &DatasetVersion {
        &self.version
    }

    /// Return the stored result for the key, or run `producer` to make it.
    ///
    /// At most one producer runs per key; other callers for that key wait
    /// and share its result. An `Err` from the producer is returned to the
    /// caller that ran it and nothing is stored.
    pub fn get_or_compute<E, F>(
        &self,
        template: &str,
        filter: &FilterSelection,
        producer: F,
    ) -> Result<Arc<TabularResult>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Result<TabularResult, E>,
    {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return producer().map(Arc::new);
        }

        let version = self.version.current();
        self.purge_stale(version);

        let key = CacheKey {
            template: template.to_string(),
            fingerprint: fingerprint(filter).map_err(CacheError::from)?,
            version,
        };
        // Clone the cell out so no shard lock is held while producing.
        let cell = Arc::clone(&self.entries.entry(key.clone()).or_default());

        let mut produced = false;
        let outcome = cell.get_or_try_init(|| {
            produced = true;
            producer().map(|rows| CacheEntry {
                rows: Arc::new(rows),
                created_at: SystemTime::now(),
            })
        });

        match outcome {
            Ok(entry) => {
                if produced {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    debug!(template, version, "cache miss, stored result");
                } else {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(template, version, "cache hit");
                }
                Ok(Arc::clone(&entry.rows))
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.entries
                    .remove_if(&key, |_, c| Arc::ptr_eq(c, &cell) && c.get().is_none());
                debug!(template, version, "producer failed, nothing stored");
                Err(e)
            }
        }
    }

    /// Drop entries of versions older than `current` the first time
    /// `current` is seen. A caller still holding an older version never
    /// moves `observed` backwards.
    fn purge_stale(&self, current: u64) {
        let previous = self.observed.fetch_max(current, Ordering::AcqRel);
        if previous < current {
            let before = self.entries.len();
            self.entries.retain(|key, _| key.version == current);
            debug!(
                from = previous,
                to = current,
                purged = before - self.entries.len(),
                "dataset version changed"
            );
        }
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
            version: self.version.current(),
        }
    }
}
