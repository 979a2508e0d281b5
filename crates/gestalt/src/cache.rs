//! The typed-value cache: memoizes decoded values by `(path, type, tags)`.
//!
//! Values are stored type-erased behind `Arc<dyn Any>`; the cache holds no
//! node references, so generations can be dropped freely. Reload clears the
//! map before the new generation is published.

use crate::tag::Tags;
use moka::sync::Cache;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::trace;

const DEFAULT_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    path: String,
    type_id: TypeId,
    tags: Tags,
}

impl CacheKey {
    pub(crate) fn new<T: 'static>(path: &str, tags: Tags) -> Self {
        Self { path: path.to_owned(), type_id: TypeId::of::<T>(), tags }
    }
}

pub(crate) struct ValueCache {
    inner: Cache<CacheKey, Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for ValueCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCache").field("entries", &self.inner.entry_count()).finish()
    }
}

impl ValueCache {
    pub(crate) fn new() -> Self {
        Self { inner: Cache::new(DEFAULT_CAPACITY) }
    }

    pub(crate) fn get<T: Clone + Send + Sync + 'static>(&self, key: &CacheKey) -> Option<T> {
        self.inner.get(key).and_then(|value| value.downcast_ref::<T>().cloned())
    }

    pub(crate) fn insert<T: Clone + Send + Sync + 'static>(&self, key: CacheKey, value: T) {
        self.inner.insert(key, Arc::new(value));
    }

    pub(crate) fn invalidate_all(&self) {
        trace!("clearing typed-value cache");
        self.inner.invalidate_all();
    }
}
