//! Incremental loading of paged collections over the shared cache store.
//!
//! A collection is fetched one page at a time at offsets `page_index * limit`.
//! A page shorter than `limit` ends the sequence. The flattened view is the
//! concatenation of cached pages in order: no sorting and no dedup.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::Abortable;

use crate::core::error::ApiError;
use crate::core::key::CacheKey;
use crate::core::store::{
    CacheEntry, CacheStore, Cacheable, FetchTicket, FetchToken, Page, PageWrite,
};

pub use crate::core::store::SkipReason;

/// Offset and size of one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

/// The fetch function for one paged collection.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Cacheable;

    fn cache_key(&self) -> CacheKey;

    /// The endpoint returns everything at once; the first page is also the last.
    fn single_page(&self) -> bool {
        false
    }

    async fn fetch_page(&self, request: PageRequest) -> Result<Vec<Self::Item>, ApiError>;
}

/// The fetch function for a single cached resource.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    type Item: Cacheable;

    fn cache_key(&self) -> CacheKey;

    async fn fetch(&self) -> Result<Self::Item, ApiError>;
}

/// Offset of the next page, or `None` once a short page has been seen.
pub fn next_page_param(pages: &[Page], limit: usize) -> Option<usize> {
    match pages.last() {
        None => Some(0),
        Some(last) if last.len() < limit => None,
        Some(_) => Some(pages.len() * limit),
    }
}

/// Concatenate pages in fetch order.
pub fn flatten<T: Cacheable>(pages: &[Page]) -> Vec<T> {
    pages
        .iter()
        .flatten()
        .filter_map(T::from_item)
        .cloned()
        .collect()
}

/// What happened to a fetch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched {
        offset: usize,
        len: usize,
        has_more: bool,
    },
    Skipped(SkipReason),
    Failed(ApiError),
    /// The key was reset while the request was out; the response was dropped.
    Discarded,
}

impl FetchOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchOutcome::Fetched { .. })
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            FetchOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Progress flags for a paged collection, without the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStatus {
    pub page_count: usize,
    pub item_count: usize,
    pub next_offset: usize,
    pub has_more: bool,
    /// First page in flight with nothing cached yet.
    pub is_loading: bool,
    /// First page in flight over cached data.
    pub is_refetching: bool,
    /// A later page in flight.
    pub is_fetching_next: bool,
    pub is_stale: bool,
}

impl PageStatus {
    fn from_entry(entry: Option<&CacheEntry>, limit: usize, stale_after: Duration) -> Self {
        let Some(entry) = entry else {
            return PageStatus {
                page_count: 0,
                item_count: 0,
                next_offset: 0,
                has_more: true,
                is_loading: false,
                is_refetching: false,
                is_fetching_next: false,
                is_stale: false,
            };
        };
        let in_flight = entry.in_flight_page();
        let page_count = entry.page_count();
        PageStatus {
            page_count,
            item_count: entry.item_count(),
            next_offset: page_count * limit,
            has_more: entry.has_more(),
            is_loading: in_flight == Some(0) && page_count == 0,
            is_refetching: in_flight == Some(0) && page_count > 0,
            is_fetching_next: in_flight.is_some_and(|index| index > 0),
            is_stale: entry.is_stale(stale_after),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.is_loading || self.is_refetching || self.is_fetching_next
    }
}

/// Everything the rendering layer needs for one paged collection.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState<T> {
    pub items: Vec<T>,
    pub status: PageStatus,
    pub error: Option<ApiError>,
}

/// Frees the in-flight slot if the fetch future is dropped before the request completes.
struct SlotGuard<'a> {
    store: &'a CacheStore,
    token: FetchToken,
    armed: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.cancel_fetch(&self.token);
        }
    }
}

/// Admit, run, and record one fetch.
async fn run_fetch<T, Fut>(
    store: &CacheStore,
    ticket: FetchTicket,
    offset: usize,
    request: Fut,
    has_more: impl FnOnce(usize) -> bool,
) -> FetchOutcome
where
    T: Cacheable,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let FetchTicket {
        token,
        registration,
    } = ticket;
    let mut guard = SlotGuard {
        store,
        token,
        armed: true,
    };

    let response = Abortable::new(request, registration).await;
    guard.armed = false;
    let token = &guard.token;
    match response {
        Err(_aborted) => {
            log::debug!("Fetch of {} page {} aborted", token.key, token.page_index);
            FetchOutcome::Discarded
        }
        Ok(Ok(items)) => {
            let len = items.len();
            let has_more = has_more(len);
            let items: Page = items.into_iter().map(Cacheable::into_item).collect();
            if store.finish_fetch(token, PageWrite::Page { items, has_more }) {
                log::debug!(
                    "Fetched {} page {} ({len} items, has_more={has_more})",
                    token.key,
                    token.page_index
                );
                FetchOutcome::Fetched {
                    offset,
                    len,
                    has_more,
                }
            } else {
                FetchOutcome::Discarded
            }
        }
        Ok(Err(e)) => {
            log::warn!("Fetch of {} page {} failed: {}", token.key, token.page_index, e);
            if store.finish_fetch(token, PageWrite::Failed(e.clone())) {
                FetchOutcome::Failed(e)
            } else {
                FetchOutcome::Discarded
            }
        }
    }
}

// ---------------------------------------------------------------------------
// InfiniteQuery
// ---------------------------------------------------------------------------

/// Incremental view over one paged collection.
///
/// Cheap to clone; clones share the store entry and therefore all state.
pub struct InfiniteQuery<S: PageSource> {
    store: CacheStore,
    source: Arc<S>,
    key: CacheKey,
    limit: usize,
    stale_after: Duration,
}

impl<S: PageSource> Clone for InfiniteQuery<S> {
    fn clone(&self) -> Self {
        InfiniteQuery {
            store: self.store.clone(),
            source: Arc::clone(&self.source),
            key: self.key.clone(),
            limit: self.limit,
            stale_after: self.stale_after,
        }
    }
}

impl<S: PageSource> InfiniteQuery<S> {
    pub fn new(store: CacheStore, source: S, limit: usize, stale_after: Duration) -> Self {
        let key = source.cache_key();
        InfiniteQuery {
            store,
            source: Arc::new(source),
            key,
            limit: limit.max(1),
            stale_after,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn status(&self) -> PageStatus {
        PageStatus::from_entry(self.store.get(&self.key).as_ref(), self.limit, self.stale_after)
    }

    pub fn state(&self) -> PageState<S::Item> {
        let entry = self.store.get(&self.key);
        PageState {
            items: entry
                .as_ref()
                .map(|e| flatten(e.pages()))
                .unwrap_or_default(),
            status: PageStatus::from_entry(entry.as_ref(), self.limit, self.stale_after),
            error: entry.as_ref().and_then(|e| e.error().cloned()),
        }
    }

    /// Read the collection: fetch the first page when nothing is cached or the
    /// cache is stale, otherwise serve what is there.
    pub async fn load(&self) -> FetchOutcome {
        let stale_after = self.stale_after;
        self.fetch_with(|entry| {
            if entry.page_count() == 0 || entry.is_stale(stale_after) {
                Ok(0)
            } else {
                Err(SkipReason::Fresh)
            }
        })
        .await
    }

    /// Fetch the page after the last cached one.
    ///
    /// A no-op while another fetch for the key is in flight or after a short page.
    pub async fn fetch_next_page(&self) -> FetchOutcome {
        let limit = self.limit;
        self.fetch_with(|entry| {
            if !entry.has_more() {
                return Err(SkipReason::Exhausted);
            }
            next_page_param(entry.pages(), limit)
                .map(|offset| offset / limit)
                .ok_or(SkipReason::Exhausted)
        })
        .await
    }

    /// Refetch from offset 0, replacing every cached page.
    pub async fn refetch(&self) -> FetchOutcome {
        self.fetch_with(|_| Ok(0)).await
    }

    /// Forget all pages; the next fetch starts at offset 0.
    pub fn reset(&self) {
        self.store.reset(&self.key);
    }

    async fn fetch_with(
        &self,
        plan: impl FnOnce(&CacheEntry) -> Result<usize, SkipReason>,
    ) -> FetchOutcome {
        let ticket = match self.store.begin_fetch(&self.key, plan) {
            Ok(ticket) => ticket,
            Err(reason) => return FetchOutcome::Skipped(reason),
        };
        let offset = ticket.token.page_index * self.limit;
        let request = PageRequest {
            offset,
            limit: self.limit,
        };
        log::debug!("Requesting {} offset={} limit={}", self.key, offset, self.limit);

        let limit = self.limit;
        let single_page = self.source.single_page();
        run_fetch(
            &self.store,
            ticket,
            offset,
            self.source.fetch_page(request),
            |len| !single_page && len >= limit,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// ResourceQuery
// ---------------------------------------------------------------------------

/// State of a single cached resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_stale: bool,
    pub error: Option<ApiError>,
}

/// A one-item entry (message detail, user info, image) under the same cache rules.
pub struct ResourceQuery<S: ResourceSource> {
    store: CacheStore,
    source: Arc<S>,
    key: CacheKey,
    stale_after: Duration,
}

impl<S: ResourceSource> Clone for ResourceQuery<S> {
    fn clone(&self) -> Self {
        ResourceQuery {
            store: self.store.clone(),
            source: Arc::clone(&self.source),
            key: self.key.clone(),
            stale_after: self.stale_after,
        }
    }
}

impl<S: ResourceSource> ResourceQuery<S> {
    pub fn new(store: CacheStore, source: S, stale_after: Duration) -> Self {
        let key = source.cache_key();
        ResourceQuery {
            store,
            source: Arc::new(source),
            key,
            stale_after,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> ResourceState<S::Item> {
        let Some(entry) = self.store.get(&self.key) else {
            return ResourceState {
                data: None,
                is_loading: false,
                is_stale: false,
                error: None,
            };
        };
        ResourceState {
            data: flatten(entry.pages()).into_iter().next(),
            is_loading: entry.is_in_flight(),
            is_stale: entry.is_stale(self.stale_after),
            error: entry.error().cloned(),
        }
    }

    /// Fetch when absent or stale.
    pub async fn load(&self) -> FetchOutcome {
        let stale_after = self.stale_after;
        self.fetch_with(|entry| {
            if entry.page_count() == 0 || entry.is_stale(stale_after) {
                Ok(0)
            } else {
                Err(SkipReason::Fresh)
            }
        })
        .await
    }

    pub async fn refetch(&self) -> FetchOutcome {
        self.fetch_with(|_| Ok(0)).await
    }

    pub fn reset(&self) {
        self.store.reset(&self.key);
    }

    async fn fetch_with(
        &self,
        plan: impl FnOnce(&CacheEntry) -> Result<usize, SkipReason>,
    ) -> FetchOutcome {
        let ticket = match self.store.begin_fetch(&self.key, plan) {
            Ok(ticket) => ticket,
            Err(reason) => return FetchOutcome::Skipped(reason),
        };
        let source = Arc::clone(&self.source);
        let request = async move { source.fetch().await.map(|item| vec![item]) };
        run_fetch(&self.store, ticket, 0, request, |_| false).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::Utc;
    use tokio::sync::Notify;

    use super::*;
    use crate::core::models::Achievement;

    /// Scripted page source: pops one response per call and records offsets.
    pub(crate) struct ScriptedSource {
        key: CacheKey,
        responses: Mutex<VecDeque<Result<Vec<Achievement>, ApiError>>>,
        pub(crate) offsets: Mutex<Vec<usize>>,
        pub(crate) calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        single_page: bool,
    }

    impl ScriptedSource {
        pub(crate) fn new(responses: Vec<Result<Vec<Achievement>, ApiError>>) -> Self {
            ScriptedSource {
                key: CacheKey::achievements(Some("alice".into())),
                responses: Mutex::new(responses.into()),
                offsets: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                gate: None,
                single_page: false,
            }
        }

        pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn unpaginated(mut self) -> Self {
            self.single_page = true;
            self
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        type Item = Achievement;

        fn cache_key(&self) -> CacheKey {
            self.key.clone()
        }

        fn single_page(&self) -> bool {
            self.single_page
        }

        async fn fetch_page(&self, request: PageRequest) -> Result<Vec<Achievement>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.offsets.lock().unwrap().push(request.offset);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    pub(crate) fn items(prefix: &str, n: usize) -> Vec<Achievement> {
        (0..n)
            .map(|i| Achievement {
                name: format!("{prefix}{i}"),
                achieved_at: Utc::now(),
            })
            .collect()
    }

    fn query(
        source: ScriptedSource,
        limit: usize,
    ) -> (InfiniteQuery<ScriptedSource>, Arc<ScriptedSource>) {
        let q = InfiniteQuery::new(CacheStore::new(), source, limit, Duration::from_secs(300));
        let source = Arc::clone(&q.source);
        (q, source)
    }

    #[test]
    fn next_page_param_rules() {
        let full: Page = items("a", 2).into_iter().map(Cacheable::into_item).collect();
        let short: Page = items("b", 1).into_iter().map(Cacheable::into_item).collect();

        assert_eq!(next_page_param(&[], 2), Some(0));
        assert_eq!(next_page_param(&[full.clone()], 2), Some(2));
        assert_eq!(next_page_param(&[full.clone(), full.clone()], 2), Some(4));
        assert_eq!(next_page_param(&[full.clone(), short], 2), None);
        assert_eq!(next_page_param(&[full, Vec::new()], 2), None);
    }

    #[tokio::test]
    async fn short_page_terminates() {
        let (q, source) = query(
            ScriptedSource::new(vec![Ok(items("a", 20)), Ok(items("b", 5))]),
            20,
        );

        let first = q.fetch_next_page().await;
        assert_eq!(
            first,
            FetchOutcome::Fetched {
                offset: 0,
                len: 20,
                has_more: true
            }
        );
        assert_eq!(q.status().next_offset, 20);

        let second = q.fetch_next_page().await;
        assert_eq!(
            second,
            FetchOutcome::Fetched {
                offset: 20,
                len: 5,
                has_more: false
            }
        );

        let state = q.state();
        assert_eq!(state.items.len(), 25);
        assert!(!state.status.has_more);

        for _ in 0..3 {
            assert_eq!(
                q.fetch_next_page().await,
                FetchOutcome::Skipped(SkipReason::Exhausted)
            );
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_page_terminates() {
        let (q, source) = query(ScriptedSource::new(vec![Ok(items("a", 3)), Ok(Vec::new())]), 3);
        q.fetch_next_page().await;
        assert_eq!(
            q.fetch_next_page().await,
            FetchOutcome::Fetched {
                offset: 3,
                len: 0,
                has_more: false
            }
        );
        assert_eq!(
            q.fetch_next_page().await,
            FetchOutcome::Skipped(SkipReason::Exhausted)
        );
        assert_eq!(q.state().items.len(), 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn offsets_grow_by_limit() {
        let (q, source) = query(
            ScriptedSource::new(vec![Ok(items("a", 10)), Ok(items("b", 10)), Ok(items("c", 10))]),
            10,
        );
        for _ in 0..3 {
            assert!(q.fetch_next_page().await.is_fetched());
        }
        assert_eq!(*source.offsets.lock().unwrap(), vec![0, 10, 20]);
    }

    #[tokio::test]
    async fn flatten_preserves_order_without_dedup() {
        let p0 = items("x", 2);
        let p1 = vec![p0[1].clone(), p0[0].clone()];
        let (q, _) = query(ScriptedSource::new(vec![Ok(p0.clone()), Ok(p1.clone())]), 2);
        q.fetch_next_page().await;
        q.fetch_next_page().await;

        let expected: Vec<Achievement> = p0.into_iter().chain(p1).collect();
        assert_eq!(q.state().items, expected);
    }

    #[tokio::test]
    async fn fetch_while_in_flight_is_a_no_op() {
        let gate = Arc::new(Notify::new());
        let (q, source) = query(
            ScriptedSource::new(vec![Ok(items("a", 2))]).gated(Arc::clone(&gate)),
            2,
        );

        let pending = {
            let q = q.clone();
            tokio::spawn(async move { q.fetch_next_page().await })
        };
        while source.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(q.status().is_loading);

        assert_eq!(
            q.fetch_next_page().await,
            FetchOutcome::Skipped(SkipReason::InFlight)
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert!(pending.await.unwrap().is_fetched());
        assert!(!q.status().is_in_flight());
    }

    #[tokio::test]
    async fn dropped_fetch_releases_the_key() {
        let gate = Arc::new(Notify::new());
        let (q, source) = query(
            ScriptedSource::new(vec![Ok(items("a", 2))]).gated(Arc::clone(&gate)),
            2,
        );

        let timed_out = tokio::time::timeout(Duration::from_millis(20), q.fetch_next_page()).await;
        assert!(timed_out.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        let status = q.status();
        assert!(!status.is_in_flight());
        assert_eq!(status.page_count, 0);

        gate.notify_one();
        assert_eq!(
            q.fetch_next_page().await,
            FetchOutcome::Fetched {
                offset: 0,
                len: 2,
                has_more: true
            }
        );
        assert_eq!(*source.offsets.lock().unwrap(), vec![0, 0]);
    }

    #[tokio::test]
    async fn failed_page_keeps_items_and_allows_retry() {
        let (q, source) = query(
            ScriptedSource::new(vec![
                Ok(items("a", 2)),
                Err(ApiError::from_status(404, "Message not found")),
                Ok(items("b", 1)),
            ]),
            2,
        );
        q.fetch_next_page().await;

        let failed = q.fetch_next_page().await;
        assert!(failed.error().is_some_and(ApiError::is_not_found));
        let state = q.state();
        assert_eq!(state.items.len(), 2);
        assert!(state.status.has_more);
        assert!(!state.status.is_fetching_next);
        assert!(state.error.is_some());

        let retried = q.fetch_next_page().await;
        assert_eq!(
            retried,
            FetchOutcome::Fetched {
                offset: 2,
                len: 1,
                has_more: false
            }
        );
        assert_eq!(q.state().items.len(), 3);
        assert!(q.state().error.is_none());
        assert_eq!(*source.offsets.lock().unwrap(), vec![0, 2, 2]);
    }

    #[tokio::test]
    async fn failed_initial_fetch_shows_error_without_items() {
        let (q, _) = query(
            ScriptedSource::new(vec![Err(ApiError::from_status(500, "boom"))]),
            2,
        );
        assert!(q.load().await.error().is_some());
        let state = q.state();
        assert!(state.items.is_empty());
        assert_eq!(state.error.map(|e| e.message), Some("boom".to_string()));
    }

    #[tokio::test]
    async fn reset_starts_over_at_offset_zero() {
        let (q, source) = query(
            ScriptedSource::new(vec![Ok(items("a", 2)), Ok(items("b", 1)), Ok(items("c", 2))]),
            2,
        );
        q.fetch_next_page().await;
        q.fetch_next_page().await;
        assert!(!q.status().has_more);

        q.reset();
        let state = q.state();
        assert!(state.items.is_empty());
        assert!(state.status.has_more);

        q.fetch_next_page().await;
        assert_eq!(*source.offsets.lock().unwrap(), vec![0, 2, 0]);
    }

    #[tokio::test]
    async fn reset_discards_in_flight_response() {
        let gate = Arc::new(Notify::new());
        let (q, source) = query(
            ScriptedSource::new(vec![Ok(items("late", 2))]).gated(Arc::clone(&gate)),
            2,
        );
        let pending = {
            let q = q.clone();
            tokio::spawn(async move { q.fetch_next_page().await })
        };
        while source.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        q.reset();
        gate.notify_one();
        assert_eq!(pending.await.unwrap(), FetchOutcome::Discarded);
        assert!(q.state().items.is_empty());
    }

    #[tokio::test]
    async fn load_serves_fresh_cache_and_refetches_stale() {
        let (q, source) = query(
            ScriptedSource::new(vec![Ok(items("a", 2)), Ok(items("b", 2)), Ok(items("fresh", 1))]),
            2,
        );
        assert!(q.load().await.is_fetched());
        q.fetch_next_page().await;
        assert_eq!(q.load().await, FetchOutcome::Skipped(SkipReason::Fresh));

        q.store.invalidate(q.key());
        assert!(q.status().is_stale);
        // Stale data is still served until replaced.
        assert_eq!(q.state().items.len(), 4);

        assert_eq!(
            q.load().await,
            FetchOutcome::Fetched {
                offset: 0,
                len: 1,
                has_more: false
            }
        );
        let state = q.state();
        assert_eq!(state.items.len(), 1);
        assert!(!state.status.is_stale);
        assert_eq!(*source.offsets.lock().unwrap(), vec![0, 2, 0]);
    }

    #[tokio::test]
    async fn single_page_source_never_asks_for_more() {
        let (q, source) = query(ScriptedSource::new(vec![Ok(items("a", 50))]).unpaginated(), 20);
        assert_eq!(
            q.fetch_next_page().await,
            FetchOutcome::Fetched {
                offset: 0,
                len: 50,
                has_more: false
            }
        );
        assert_eq!(
            q.fetch_next_page().await,
            FetchOutcome::Skipped(SkipReason::Exhausted)
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    struct CountingResource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResourceSource for CountingResource {
        type Item = Achievement;

        fn cache_key(&self) -> CacheKey {
            CacheKey::achievements(None)
        }

        async fn fetch(&self) -> Result<Achievement, ApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(items("r", n + 1).pop().unwrap())
        }
    }

    #[tokio::test]
    async fn resource_query_caches_until_stale() {
        let store = CacheStore::new();
        let q = ResourceQuery::new(
            store.clone(),
            CountingResource {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(60),
        );
        assert!(q.state().data.is_none());

        assert!(q.load().await.is_fetched());
        assert_eq!(q.state().data.map(|a| a.name), Some("r0".to_string()));
        assert_eq!(q.load().await, FetchOutcome::Skipped(SkipReason::Fresh));

        store.invalidate(q.key());
        assert!(q.load().await.is_fetched());
        assert_eq!(q.state().data.map(|a| a.name), Some("r1".to_string()));
        assert_eq!(q.source.calls.load(Ordering::SeqCst), 2);
    }
}
