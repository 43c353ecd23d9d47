//! Whole-response cache for pages that tolerate staleness.
//!
//! Entries live for a fixed time and are never invalidated by writes: a post
//! deleted inside the window keeps showing up until the entry expires or
//! [`PageCache::clear`] is called.

use std::{future::Future, time::Duration};

use bytes::Bytes;
use moka::future::Cache;
use tracing::debug;

const MAX_ENTRIES: u64 = 1_000;

#[derive(Clone)]
pub struct PageCache {
    pages: Cache<String, Bytes>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        let pages = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(ttl)
            .build();

        Self { pages }
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.pages.get(key).await
    }

    pub async fn insert(&self, key: String, body: Bytes) {
        self.pages.insert(key, body).await;
    }

    /// Serve `key` from the cache, rendering and storing it on a miss.
    /// Failed renders are not cached.
    pub async fn get_or_render<F, Fut, E>(&self, key: &str, render: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        if let Some(body) = self.get(key).await {
            debug!(key, "page cache hit");
            return Ok(body);
        }

        debug!(key, "page cache miss");
        let body = render().await?;
        self.insert(key.to_string(), body.clone()).await;
        Ok(body)
    }

    /// Drop every cached page.
    pub fn clear(&self) {
        self.pages.invalidate_all();
        debug!("page cache cleared");
    }
}
