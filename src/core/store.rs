use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::{AbortHandle, AbortRegistration};
use indexmap::IndexMap;

use crate::core::error::{ApiError, CacheError};
use crate::core::key::CacheKey;
use crate::core::models::{Achievement, ImageUrl, Message, MessageDetail, UserInfo};

// ---------------------------------------------------------------------------
// Items and pages
// ---------------------------------------------------------------------------

/// Anything the store can hold. The store never inspects item content.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Message(Message),
    Achievement(Achievement),
    MessageDetail(MessageDetail),
    UserInfo(UserInfo),
    Image(ImageUrl),
}

/// Conversion between a typed value and its stored [`Item`].
pub trait Cacheable: Clone + Send + Sync + 'static {
    fn into_item(self) -> Item;
    fn from_item(item: &Item) -> Option<&Self>;
}

macro_rules! cacheable {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Cacheable for $ty {
                fn into_item(self) -> Item {
                    Item::$ty(self)
                }

                fn from_item(item: &Item) -> Option<&Self> {
                    match item {
                        Item::$ty(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

cacheable!(Message, Achievement, MessageDetail, UserInfo);

impl Cacheable for ImageUrl {
    fn into_item(self) -> Item {
        Item::Image(self)
    }

    fn from_item(item: &Item) -> Option<&Self> {
        match item {
            Item::Image(value) => Some(value),
            _ => None,
        }
    }
}

/// One fetch worth of items, in server order.
pub type Page = Vec<Item>;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct InFlight {
    page_index: usize,
    abort: AbortHandle,
    /// `invalidations` when the fetch began.
    invalidations: u64,
}

/// Snapshot of everything cached under one key.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pages: Vec<Page>,
    stale: bool,
    invalidations: u64,
    in_flight: Option<InFlight>,
    has_more: bool,
    error: Option<ApiError>,
    generation: u64,
    updated_at: Option<Instant>,
}

impl CacheEntry {
    fn new(generation: u64) -> Self {
        CacheEntry {
            pages: Vec::new(),
            stale: false,
            invalidations: 0,
            in_flight: None,
            has_more: true,
            error: None,
            generation,
            updated_at: None,
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn item_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    /// Explicitly invalidated, or older than `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.stale || self.updated_at.is_some_and(|at| at.elapsed() >= max_age)
    }

    pub fn is_invalidated(&self) -> bool {
        self.stale
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Page index of the fetch currently in flight.
    pub fn in_flight_page(&self) -> Option<usize> {
        self.in_flight.as_ref().map(|f| f.page_index)
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    fn write_page(&mut self, index: usize, items: Page) -> Result<(), usize> {
        if index > self.pages.len() {
            return Err(self.pages.len());
        }
        // Pages after a replaced page were fetched at offsets derived from it.
        self.pages.truncate(index);
        self.pages.push(items);
        self.updated_at = Some(Instant::now());
        self.error = None;
        if index == 0 {
            self.stale = false;
        }
        Ok(())
    }

    fn mark_stale(&mut self) {
        self.stale = true;
        self.invalidations += 1;
    }

    fn clear(&mut self, generation: u64) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.abort.abort();
        }
        *self = CacheEntry::new(generation);
    }
}

// ---------------------------------------------------------------------------
// Fetch admission
// ---------------------------------------------------------------------------

/// Why a fetch was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another fetch for the key has not completed yet.
    InFlight,
    /// A short page ended the sequence.
    Exhausted,
    /// Cached data is present and not stale.
    Fresh,
}

/// Identifies one fetch against the generation it was started in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchToken {
    pub key: CacheKey,
    pub generation: u64,
    pub page_index: usize,
}

/// Granted by [`CacheStore::begin_fetch`]; the registration aborts the request on reset.
#[derive(Debug)]
pub struct FetchTicket {
    pub token: FetchToken,
    pub registration: AbortRegistration,
}

/// Result of a fetch, written back with [`CacheStore::finish_fetch`].
#[derive(Debug, Clone)]
pub enum PageWrite {
    Page { items: Page, has_more: bool },
    Failed(ApiError),
}

// ---------------------------------------------------------------------------
// CacheStore: Clone + Send + Sync shared handle
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    entries: IndexMap<CacheKey, CacheEntry>,
    generations: u64,
}

impl Inner {
    fn next_generation(&mut self) -> u64 {
        self.generations += 1;
        self.generations
    }

    fn entry_mut(&mut self, key: &CacheKey) -> &mut CacheEntry {
        if !self.entries.contains_key(key) {
            let generation = self.next_generation();
            self.entries.insert(key.clone(), CacheEntry::new(generation));
        }
        &mut self.entries[key]
    }
}

/// Key → entry mapping shared by every query and mutation in the process.
///
/// Construct one at startup and hand out clones; all clones see the same entries.
/// Every method is synchronous and holds the lock only for its own duration.
#[derive(Clone, Default)]
pub struct CacheStore {
    inner: Arc<Mutex<Inner>>,
}

impl CacheStore {
    pub fn new() -> Self {
        CacheStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Each method leaves the map consistent before it can panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the entry for `key`, or `None` if nothing was ever read for it.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().entries.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.lock().entries.keys().cloned().collect()
    }

    /// Append (`page_index == page count`) or replace a page.
    ///
    /// Replacing a page drops every page after it.
    pub fn put(&self, key: &CacheKey, page_index: usize, items: Page) -> Result<(), CacheError> {
        let mut inner = self.lock();
        inner
            .entry_mut(key)
            .write_page(page_index, items)
            .map_err(|len| CacheError::PageGap {
                key: key.clone(),
                index: page_index,
                len,
            })
    }

    /// Mark `key` stale. Cached pages stay servable until a refetch replaces them.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        match self.lock().entries.get_mut(key) {
            Some(entry) => {
                entry.mark_stale();
                true
            }
            None => false,
        }
    }

    /// Mark every key matching `predicate` stale; returns how many were marked.
    pub fn invalidate_where(&self, predicate: impl Fn(&CacheKey) -> bool) -> usize {
        let mut inner = self.lock();
        let mut count = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if predicate(key) {
                entry.mark_stale();
                count += 1;
            }
        }
        count
    }

    /// Drop all pages for `key` and abort its in-flight fetch.
    ///
    /// The entry moves to a new generation so a late response is discarded.
    pub fn reset(&self, key: &CacheKey) {
        let mut inner = self.lock();
        if !inner.entries.contains_key(key) {
            return;
        }
        let generation = inner.next_generation();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.clear(generation);
        }
        log::debug!("Cache reset {key} (generation {generation})");
    }

    /// Forget `key` entirely, aborting its in-flight fetch.
    pub fn remove(&self, key: &CacheKey) -> bool {
        match self.lock().entries.shift_remove(key) {
            Some(mut entry) => {
                if let Some(in_flight) = entry.in_flight.take() {
                    in_flight.abort.abort();
                }
                log::debug!("Cache removed {key}");
                true
            }
            None => false,
        }
    }

    /// Reset every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let keys: Vec<CacheKey> = inner.entries.keys().cloned().collect();
        for key in keys {
            let generation = inner.next_generation();
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.clear(generation);
            }
        }
    }

    /// Admit a fetch for `key`, creating the entry on first use.
    ///
    /// `plan` picks the page index to fetch from the current entry, or refuses.
    /// At most one fetch per key is admitted at a time.
    pub fn begin_fetch(
        &self,
        key: &CacheKey,
        plan: impl FnOnce(&CacheEntry) -> Result<usize, SkipReason>,
    ) -> Result<FetchTicket, SkipReason> {
        let mut inner = self.lock();
        let entry = inner.entry_mut(key);
        if entry.in_flight.is_some() {
            return Err(SkipReason::InFlight);
        }
        let page_index = plan(&*entry)?;
        let (abort, registration) = AbortHandle::new_pair();
        entry.in_flight = Some(InFlight {
            page_index,
            abort,
            invalidations: entry.invalidations,
        });
        Ok(FetchTicket {
            token: FetchToken {
                key: key.clone(),
                generation: entry.generation,
                page_index,
            },
            registration,
        })
    }

    /// Release the slot of an admitted fetch that was dropped before it finished.
    ///
    /// Nothing is written; a slot taken by a later generation is left alone.
    pub fn cancel_fetch(&self, token: &FetchToken) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(&token.key) else {
            return;
        };
        if entry.generation == token.generation
            && entry.in_flight_page() == Some(token.page_index)
        {
            entry.in_flight = None;
            log::debug!("Fetch of {} page {} cancelled", token.key, token.page_index);
        }
    }

    /// Record the result of an admitted fetch.
    ///
    /// Returns `false` when the entry was reset since the fetch began; nothing is written then.
    pub fn finish_fetch(&self, token: &FetchToken, write: PageWrite) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(&token.key) else {
            return false;
        };
        if entry.generation != token.generation {
            log::debug!(
                "Discarding late page {} for {} (generation {} != {})",
                token.page_index,
                token.key,
                token.generation,
                entry.generation
            );
            return false;
        }
        let started = entry.in_flight.take().map(|f| f.invalidations);
        match write {
            PageWrite::Page { items, has_more } => {
                if let Err(len) = entry.write_page(token.page_index, items) {
                    log::warn!(
                        "Dropping page {} for {}: only {} pages cached",
                        token.page_index,
                        token.key,
                        len
                    );
                    return false;
                }
                entry.has_more = has_more;
                // Invalidated while the request was out: the page may predate the write.
                if started.is_some_and(|n| n != entry.invalidations) {
                    entry.stale = true;
                }
            }
            PageWrite::Failed(error) => {
                entry.error = Some(error);
            }
        }
        true
    }
}
