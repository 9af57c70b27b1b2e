use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::FeedClient;
use crate::error::ClientError;
use crate::models::{Item, ItemId};

/// Observable state of a [`FeedController`].
///
/// Presentation code reads it through [`FeedController::snapshot`] or a
/// [`FeedController::subscribe`] receiver; it cannot mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    items: Vec<Item>,
    current_page: u32,
    is_loading_first_page: bool,
    is_loading_more: bool,
    has_more_data: bool,
    last_error: Option<ClientError>,
    // bumped by every first-page load; responses from older generations are dropped
    generation: u64,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current_page: 1,
            is_loading_first_page: false,
            is_loading_more: false,
            has_more_data: true,
            last_error: None,
            generation: 0,
        }
    }
}

impl FeedState {
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn is_loading_first_page(&self) -> bool {
        self.is_loading_first_page
    }

    pub fn is_loading_more(&self) -> bool {
        self.is_loading_more
    }

    pub fn has_more_data(&self) -> bool {
        self.has_more_data
    }

    /// The most recent load failure, cleared by the next successful load.
    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }
}

/// What a load call did to the owned list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was fetched and committed.
    Loaded { fetched: usize, appended: usize },
    /// Nothing was requested: no more data, or a load is already in flight.
    Skipped,
    /// The response arrived after a newer first-page load and was discarded.
    Superseded,
}

/// Owns the paginated item list and reconciles it with local likes.
///
/// All methods take `&self`; the controller can be shared behind an `Arc`
/// and its loads driven from several tasks. At most one `load_more` is in
/// flight at a time, extra calls return [`LoadOutcome::Skipped`].
pub struct FeedController<C: FeedClient + ?Sized> {
    client: Arc<C>,
    page_size: u32,
    state: watch::Sender<FeedState>,
}

impl<C: FeedClient + ?Sized> FeedController<C> {
    pub fn new(client: Arc<C>, page_size: u32) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        Self {
            client,
            page_size: page_size.max(1),
            state,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn snapshot(&self) -> FeedState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    pub fn items(&self) -> Vec<Item> {
        self.state.borrow().items.clone()
    }

    pub fn item(&self, id: ItemId) -> Option<Item> {
        self.state.borrow().item(id).cloned()
    }

    /// Fetches page 1 and replaces the whole list with it.
    ///
    /// On failure the previous list is kept and the error is both returned
    /// and recorded in [`FeedState::last_error`].
    pub async fn load_first_page(&self) -> Result<LoadOutcome, ClientError> {
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            s.is_loading_first_page = true;
            generation = s.generation;
        });
        let _guard = LoadingGuard::first_page(&self.state, generation);

        info!(page_size = self.page_size, "loading first page");
        let page_size = self.page_size as usize;

        match self.client.fetch_page(1, self.page_size).await {
            Ok(fetched) => {
                let count = fetched.len();
                let mut kept = None;
                self.state.send_if_modified(|s| {
                    if s.generation != generation {
                        return false;
                    }
                    s.items = dedup_by_id(fetched);
                    s.current_page = 1;
                    s.has_more_data = count >= page_size;
                    s.last_error = None;
                    kept = Some(s.items.len());
                    true
                });

                match kept {
                    Some(kept) => {
                        info!(fetched = count, kept, "first page loaded");
                        Ok(LoadOutcome::Loaded {
                            fetched: count,
                            appended: kept,
                        })
                    }
                    None => {
                        debug!(generation, "discarding superseded first page response");
                        Ok(LoadOutcome::Superseded)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "first page load failed");
                self.record_error(generation, &e);
                Err(e)
            }
        }
    }

    /// Fetches the next page and appends the items not already listed.
    ///
    /// No-op while another `load_more` or a first-page load is running, or
    /// once a short page has signalled the end of the feed. A failed fetch
    /// puts the page cursor back where it was.
    pub async fn load_more(&self) -> Result<LoadOutcome, ClientError> {
        let mut ticket = None;
        self.state.send_if_modified(|s| {
            if !s.has_more_data || s.is_loading_more || s.is_loading_first_page {
                return false;
            }
            s.is_loading_more = true;
            s.current_page += 1;
            ticket = Some((s.generation, s.current_page));
            true
        });

        let Some((generation, page)) = ticket else {
            debug!("load_more skipped: busy or no more data");
            return Ok(LoadOutcome::Skipped);
        };
        let mut guard = LoadingGuard::more(&self.state, page);

        debug!(page, "loading more");
        let page_size = self.page_size as usize;

        match self.client.fetch_page(page, self.page_size).await {
            Ok(fetched) => {
                let count = fetched.len();
                let mut appended = None;
                self.state.send_if_modified(|s| {
                    if s.generation != generation {
                        return false;
                    }
                    appended = Some(merge_page(&mut s.items, fetched));
                    s.has_more_data = count >= page_size;
                    s.last_error = None;
                    true
                });

                match appended {
                    Some(appended) => {
                        guard.commit();
                        info!(page, fetched = count, appended, "page merged");
                        Ok(LoadOutcome::Loaded {
                            fetched: count,
                            appended,
                        })
                    }
                    None => {
                        debug!(page, "discarding page fetched before a refresh");
                        Ok(LoadOutcome::Superseded)
                    }
                }
            }
            Err(e) => {
                warn!(page, error = %e, "load_more failed");
                self.record_error(generation, &e);
                Err(e)
            }
        }
    }

    /// Flips the like state of one item. Local only, nothing is sent.
    ///
    /// Returns the updated item, or `None` when the id is not listed.
    pub fn toggle_like(&self, item_id: ItemId) -> Option<Item> {
        let mut updated = None;
        self.state.send_if_modified(|s| {
            match s.items.iter_mut().find(|item| item.id == item_id) {
                Some(item) => {
                    item.toggle_like();
                    updated = Some(item.clone());
                    true
                }
                None => false,
            }
        });

        match &updated {
            Some(item) => debug!(item_id, liked = item.is_liked, likes = item.like_count, "like toggled"),
            None => debug!(item_id, "toggle_like on unknown item"),
        }
        updated
    }

    /// Replaces the stored item with the same id, e.g. after a detail view
    /// changed its like state. Returns false when the id is not listed.
    pub fn update_item(&self, updated: Item) -> bool {
        let item_id = updated.id;
        let replaced = self.state.send_if_modified(|s| {
            match s.items.iter_mut().find(|item| item.id == item_id) {
                Some(slot) => {
                    *slot = updated;
                    true
                }
                None => false,
            }
        });
        debug!(item_id, replaced, "update_item");
        replaced
    }

    fn record_error(&self, generation: u64, err: &ClientError) {
        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.last_error = Some(err.clone());
            true
        });
    }
}

/// Appends items whose id is not listed yet and returns how many were added.
///
/// Items already listed stay as they are, so a fresh copy from the server
/// never overwrites a local like.
fn merge_page(items: &mut Vec<Item>, fetched: Vec<Item>) -> usize {
    let mut seen: HashSet<ItemId> = items.iter().map(|item| item.id).collect();
    let before = items.len();
    items.extend(fetched.into_iter().filter(|item| seen.insert(item.id)));
    items.len() - before
}

fn dedup_by_id(fetched: Vec<Item>) -> Vec<Item> {
    let mut seen = HashSet::new();
    fetched.into_iter().filter(|item| seen.insert(item.id)).collect()
}

enum LoadKind {
    FirstPage { generation: u64 },
    More { page: u32 },
}

/// Clears the loading flag when a load finishes, fails or is dropped
/// mid-flight. An uncommitted `load_more` also rewinds the page cursor.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<FeedState>,
    kind: LoadKind,
    committed: bool,
}

impl<'a> LoadingGuard<'a> {
    fn first_page(state: &'a watch::Sender<FeedState>, generation: u64) -> Self {
        Self {
            state,
            kind: LoadKind::FirstPage { generation },
            committed: false,
        }
    }

    fn more(state: &'a watch::Sender<FeedState>, page: u32) -> Self {
        Self {
            state,
            kind: LoadKind::More { page },
            committed: false,
        }
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let committed = self.committed;
        match self.kind {
            LoadKind::FirstPage { generation } => {
                // a newer first-page load owns the flag now
                self.state.send_if_modified(|s| {
                    if s.generation != generation || !s.is_loading_first_page {
                        return false;
                    }
                    s.is_loading_first_page = false;
                    true
                });
            }
            LoadKind::More { page } => {
                self.state.send_if_modified(|s| {
                    if !committed && s.current_page == page {
                        s.current_page = page - 1;
                    }
                    s.is_loading_more = false;
                    true
                });
            }
        }
    }
}
