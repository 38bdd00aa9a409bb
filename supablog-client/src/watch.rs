//! Reactive data-fetch adapter.
//!
//! `PostFeed` is the subscription counterpart of a UI data hook: register
//! interest in a filter, receive `{data, loading, error}` snapshots until
//! the receiver is dropped. Setting an equal filter is a no-op, and a
//! response from a superseded request is discarded rather than applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::models::{FilterRequest, Post};
use crate::repository::PostRepository;

/// Snapshot of the fetch lifecycle exposed to subscribers.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub data: Option<Vec<Post>>,
    pub loading: bool,
    /// Display string of the last repository error; errors never escape the
    /// feed as panics or results.
    pub error: Option<String>,
}

pub struct PostFeed {
    repo: Arc<PostRepository>,
    tx: watch::Sender<FetchState>,
    filter: Mutex<Option<FilterRequest>>,
    generation: Arc<AtomicU64>,
}

impl PostFeed {
    pub fn new(repo: Arc<PostRepository>) -> Self {
        let (tx, _rx) = watch::channel(FetchState::default());
        Self {
            repo,
            tx,
            filter: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to state snapshots. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.tx.subscribe()
    }

    /// Register interest in a filter. Re-fetches only when the filter
    /// differs by value from the current one.
    pub async fn set_filter(&self, filter: FilterRequest) {
        // The generation is taken while the filter slot is still locked so
        // generation order always matches filter-store order.
        let generation = {
            let mut current = self.filter.lock().await;
            if current.as_ref() == Some(&filter) {
                tracing::debug!("filter unchanged, fetch skipped");
                return;
            }
            *current = Some(filter.clone());
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.spawn_fetch(filter, generation);
    }

    /// Re-run the current filter, e.g. after a known mutation.
    pub async fn refresh(&self) {
        let (filter, generation) = {
            let current = self.filter.lock().await;
            let Some(filter) = current.clone() else {
                return;
            };
            (filter, self.generation.fetch_add(1, Ordering::SeqCst) + 1)
        };
        self.spawn_fetch(filter, generation);
    }

    fn spawn_fetch(&self, filter: FilterRequest, generation: u64) {
        // Only the newest generation may publish its result.
        self.tx.send_modify(|state| state.loading = true);

        let repo = self.repo.clone();
        let tx = self.tx.clone();
        let latest = self.generation.clone();
        tokio::spawn(async move {
            let result = repo.list(&filter).await;
            tx.send_if_modified(|state| {
                if latest.load(Ordering::SeqCst) != generation {
                    tracing::debug!(generation, "stale response discarded");
                    return false;
                }
                state.loading = false;
                match result {
                    Ok(posts) => {
                        state.data = Some(posts);
                        state.error = None;
                    }
                    Err(e) => {
                        state.error = Some(e.to_string());
                    }
                }
                true
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, MemoryBackend};
    use crate::config::Config;
    use crate::error::Error;
    use crate::models::Caller;
    use crate::query::{Predicate, QueryDescriptor, POSTS_TABLE};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use uuid::Uuid;

    /// Delegates to `MemoryBackend`, delaying selects for one category and
    /// counting every select that goes through.
    struct InstrumentedBackend {
        inner: MemoryBackend,
        slow_category: Option<String>,
        delay: Duration,
        selects: AtomicUsize,
    }

    impl InstrumentedBackend {
        fn new(slow_category: Option<&str>, delay: Duration) -> Self {
            Self {
                inner: MemoryBackend::new(),
                slow_category: slow_category.map(str::to_string),
                delay,
                selects: AtomicUsize::new(0),
            }
        }

        fn is_slow(&self, query: &QueryDescriptor) -> bool {
            let Some(slow) = &self.slow_category else {
                return false;
            };
            query.predicates.iter().any(|p| {
                matches!(p, Predicate::Eq { column: "category", value } if value == slow)
            })
        }
    }

    #[async_trait]
    impl Backend for InstrumentedBackend {
        async fn select(&self, query: &QueryDescriptor) -> Result<Vec<Value>, Error> {
            self.selects.fetch_add(1, Ordering::SeqCst);
            if self.is_slow(query) {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.select(query).await
        }

        async fn insert(&self, table: &str, row: Value) -> Result<Value, Error> {
            self.inner.insert(table, row).await
        }

        async fn update(
            &self,
            table: &str,
            id: Uuid,
            patch: Value,
        ) -> Result<Option<Value>, Error> {
            self.inner.update(table, id, patch).await
        }

        async fn delete(&self, table: &str, id: Uuid) -> Result<bool, Error> {
            self.inner.delete(table, id).await
        }
    }

    async fn seed(backend: &InstrumentedBackend, slug: &str, category: &str) {
        backend
            .insert(
                POSTS_TABLE,
                json!({
                    "id": Uuid::new_v4(),
                    "title": slug,
                    "slug": slug,
                    "category": category,
                    "published": true,
                    "created_at": "2026-01-01T00:00:00Z",
                }),
            )
            .await
            .unwrap();
    }

    fn feed_over(backend: Arc<InstrumentedBackend>) -> PostFeed {
        let config = Arc::new(Config::new("https://example.supabase.co", "anon-key"));
        let repo = PostRepository::new(backend, config, Caller::Anonymous);
        PostFeed::new(Arc::new(repo))
    }

    fn category_filter(category: &str) -> FilterRequest {
        FilterRequest {
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stale_response_is_discarded() {
        let backend = Arc::new(InstrumentedBackend::new(
            Some("Slow"),
            Duration::from_millis(150),
        ));
        seed(&backend, "slow-post", "Slow").await;
        seed(&backend, "fast-post", "Fast").await;

        let feed = feed_over(backend);
        let rx = feed.subscribe();

        feed.set_filter(category_filter("Slow")).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        feed.set_filter(category_filter("Fast")).await;

        // the fast request resolves first; the slow one lands afterwards
        // and must not overwrite it
        tokio::time::sleep(Duration::from_millis(300)).await;
        let state = rx.borrow().clone();
        assert!(!state.loading);
        assert!(state.error.is_none());
        let posts = state.data.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].slug, "fast-post");
    }

    #[tokio::test]
    async fn concurrent_filter_changes_settle_on_the_stored_filter() {
        let backend = Arc::new(InstrumentedBackend::new(
            Some("Slow"),
            Duration::from_millis(150),
        ));
        seed(&backend, "slow-post", "Slow").await;
        seed(&backend, "fast-post", "Fast").await;

        let feed = feed_over(backend);
        let rx = feed.subscribe();

        // Racing registrations: whichever filter is stored last must also
        // win the generation race, so the published data always matches the
        // stored filter and a repeat registration can safely dedupe.
        tokio::join!(
            feed.set_filter(category_filter("Slow")),
            feed.set_filter(category_filter("Fast")),
        );
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Re-registering Fast either dedupes (already stored) or supersedes
        // the slow fetch; both paths must end with Fast data published.
        feed.set_filter(category_filter("Fast")).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let state = rx.borrow().clone();
        assert!(!state.loading);
        let posts = state.data.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].slug, "fast-post");
    }

    #[tokio::test]
    async fn identical_filter_does_not_refetch() {
        let backend = Arc::new(InstrumentedBackend::new(None, Duration::ZERO));
        seed(&backend, "only", "Tech").await;

        let feed = feed_over(backend.clone());
        feed.set_filter(category_filter("Tech")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        feed.set_filter(category_filter("Tech")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(backend.selects.load(Ordering::SeqCst), 1);

        feed.refresh().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.selects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repository_errors_surface_as_state() {
        let backend = Arc::new(InstrumentedBackend::new(None, Duration::ZERO));
        let feed = feed_over(backend);
        let rx = feed.subscribe();

        feed.set_filter(FilterRequest {
            limit: Some(0),
            ..Default::default()
        })
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = rx.borrow().clone();
        assert!(!state.loading);
        assert!(state.error.unwrap().contains("limit"));
    }
}
