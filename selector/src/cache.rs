// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A bounded cache of parsed selectors keyed by their canonical serialization.
//!
//! The cache is shared by concurrent admission requests and evicts the least
//! recently used selector once full. Selectors that fail to parse are never
//! cached.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::trace;

use crate::matcher::{Matcher, SelectorError, canonical_key};

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

pub struct SelectorCache {
    // None when caching is disabled
    entries: Option<Cache<String, Arc<Matcher>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for SelectorCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl SelectorCache {
    /// A cache holding at most `capacity` selectors. A capacity of 0 disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let entries = (capacity > 0).then(|| {
            Cache::builder()
                .max_capacity(u64::try_from(capacity).unwrap_or(u64::MAX))
                .eviction_policy(EvictionPolicy::lru())
                .eviction_listener(|key, _, cause| trace!("Evicting selector {key}: {cause:?}"))
                .build()
        });
        Self {
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get the parsed form of `selector`, parsing and caching it on a miss.
    pub fn get_or_parse(
        &self,
        selector: Option<&LabelSelector>,
    ) -> Result<Arc<Matcher>, SelectorError> {
        let key = canonical_key(selector)?;
        if let Some(matcher) = self.entries.as_ref().and_then(|entries| entries.get(&key)) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(matcher);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let matcher = Arc::new(Matcher::parse(selector)?);
        if let Some(entries) = &self.entries {
            entries.insert(key, matcher.clone());
        }
        Ok(matcher)
    }

    /// Counters and the number of cached selectors, after applying pending evictions
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.as_ref().map_or(0, |entries| {
            entries.run_pending_tasks();
            entries.entry_count()
        });
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}
