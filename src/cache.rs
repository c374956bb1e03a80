//! Rendered page cache keyed by `html:<slug>` and `json:<slug>`.

use moka::future::Cache;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// `Cache-Control` for public card responses.
pub const PUBLIC_CACHE_CONTROL: &str = "public, max-age=60, stale-while-revalidate=300";

#[derive(Clone, Debug)]
enum CachedPage {
    Html(Arc<String>),
    Json(Arc<Value>),
}

#[derive(Clone)]
pub struct PageCache {
    inner: Cache<String, CachedPage>,
    /// Bumped by every invalidation.
    epoch: Arc<AtomicU64>,
}

fn html_key(slug: &str) -> String {
    format!("html:{}", slug)
}

fn json_key(slug: &str) -> String {
    format!("json:{}", slug)
}

impl PageCache {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let inner = Cache::builder()
            .name("pages")
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        PageCache {
            inner,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Read before loading the data a page is rendered from; pass to the `*_since` puts.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    async fn insert_since(&self, epoch: u64, key: String, page: CachedPage) -> bool {
        if self.epoch() != epoch {
            return false;
        }
        self.inner.insert(key.clone(), page).await;
        // an invalidation may have landed between the check and the insert
        if self.epoch() != epoch {
            self.inner.invalidate(&key).await;
            return false;
        }
        true
    }

    pub async fn get_html(&self, slug: &str) -> Option<Arc<String>> {
        match self.inner.get(&html_key(slug)).await {
            Some(CachedPage::Html(h)) => Some(h),
            _ => None,
        }
    }

    pub async fn put_html(&self, slug: &str, html: String) {
        self.inner.insert(html_key(slug), CachedPage::Html(Arc::new(html))).await;
    }

    /// Caches `html` unless an invalidation happened after `epoch` was read.
    pub async fn put_html_since(&self, epoch: u64, slug: &str, html: String) -> bool {
        self.insert_since(epoch, html_key(slug), CachedPage::Html(Arc::new(html))).await
    }

    pub async fn get_json(&self, slug: &str) -> Option<Arc<Value>> {
        match self.inner.get(&json_key(slug)).await {
            Some(CachedPage::Json(v)) => Some(v),
            _ => None,
        }
    }

    pub async fn put_json(&self, slug: &str, value: Value) {
        self.inner.insert(json_key(slug), CachedPage::Json(Arc::new(value))).await;
    }

    pub async fn put_json_since(&self, epoch: u64, slug: &str, value: Value) -> bool {
        self.insert_since(epoch, json_key(slug), CachedPage::Json(Arc::new(value))).await
    }

    pub async fn invalidate_slug(&self, slug: &str) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(&html_key(slug)).await;
        self.inner.invalidate(&json_key(slug)).await;
    }

    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate_all();
    }

    /// Approximate; moka applies pending maintenance lazily.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn html_and_json_are_separate_entries() {
        let cache = PageCache::new(Duration::from_secs(60), 100);
        cache.put_html("acme", "<html>".into()).await;
        assert!(cache.get_json("acme").await.is_none());
        cache.put_json("acme", json!({"slug": "acme"})).await;
        assert_eq!(cache.get_html("acme").await.as_deref().map(String::as_str), Some("<html>"));
        cache.invalidate_slug("acme").await;
        assert!(cache.get_html("acme").await.is_none());
        assert!(cache.get_json("acme").await.is_none());
    }

    #[tokio::test]
    async fn snapshot_taken_before_an_invalidation_is_not_cached() {
        let cache = PageCache::new(Duration::from_secs(60), 100);
        let before = cache.epoch();
        cache.invalidate_slug("acme").await;
        assert!(!cache.put_html_since(before, "acme", "stale".into()).await);
        assert!(!cache.put_json_since(before, "acme", json!({})).await);
        assert!(cache.get_html("acme").await.is_none());
        assert!(cache.get_json("acme").await.is_none());

        let now = cache.epoch();
        assert!(cache.put_html_since(now, "acme", "fresh".into()).await);
        assert_eq!(cache.get_html("acme").await.as_deref().map(String::as_str), Some("fresh"));
    }
}
