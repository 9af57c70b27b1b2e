use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::client::CommentClient;
use crate::error::ClientError;
use crate::models::{Comment, CommentId, CommentPage, ItemId};

/// Cached pagination details for one item's comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Server total plus comments added locally since.
    pub total: u32,
    pub next_cursor: Option<String>,
    pub cached: usize,
    /// False while the entry only holds locally authored comments.
    pub synced: bool,
}

#[derive(Debug, Default)]
struct Thread {
    comments: Vec<Comment>,
    next_cursor: Option<String>,
    total: u32,
    // comments added through add_comment_to_cache; not part of any server total
    local: u32,
    synced: bool,
}

impl Thread {
    fn absorb(&mut self, page: CommentPage) -> usize {
        let mut seen: HashSet<CommentId> = self.comments.iter().map(|c| c.id).collect();
        let before = self.comments.len();
        self.comments
            .extend(page.list.into_iter().filter(|c| seen.insert(c.id)));
        self.next_cursor = page.next_cursor;
        self.total = page.total.saturating_add(self.local);
        self.synced = true;
        self.comments.len() - before
    }
}

/// Read-through cache of comment threads keyed by item id.
///
/// Entries are never evicted or revalidated: once an item's comments are
/// fetched they are served from memory for the lifetime of the store.
pub struct CommentStore<C: CommentClient + ?Sized> {
    client: Arc<C>,
    limit: u32,
    threads: Mutex<HashMap<ItemId, Thread>>,
}

impl<C: CommentClient + ?Sized> CommentStore<C> {
    pub fn new(client: Arc<C>, limit: u32) -> Self {
        Self {
            client,
            limit: limit.max(1),
            threads: Mutex::new(HashMap::new()),
        }
    }

    fn threads(&self) -> MutexGuard<'_, HashMap<ItemId, Thread>> {
        // the map stays consistent even if a holder panicked
        self.threads.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Comments for `item_id`, from cache when the server copy is already held.
    ///
    /// Locally added comments stay ahead of the fetched ones. A failed fetch
    /// leaves the cache untouched and falls back to any cached entry; the
    /// error is returned only when nothing is cached for the item.
    pub async fn get_comments(&self, item_id: ItemId) -> Result<Vec<Comment>, ClientError> {
        if let Some(comments) = self.synced_comments(item_id) {
            debug!(item_id, cached = comments.len(), "comment cache hit");
            return Ok(comments);
        }

        debug!(item_id, "comment cache miss");
        let page = match self.client.fetch_comments(item_id, None, self.limit).await {
            Ok(page) => page,
            Err(e) => {
                warn!(item_id, error = %e, "comment fetch failed");
                // serve whatever is cached, local-only entries included
                return self.cached_comments(item_id).ok_or(e);
            }
        };

        let mut threads = self.threads();
        let thread = threads.entry(item_id).or_default();
        if thread.synced {
            // another caller filled it while we were waiting
            return Ok(thread.comments.clone());
        }
        let added = thread.absorb(page);
        info!(item_id, added, total = thread.total, "comments cached");
        Ok(thread.comments.clone())
    }

    /// Fetches the page after the cached cursor and returns how many new
    /// comments were cached. Returns 0 without a request when the server
    /// reported no further pages.
    pub async fn load_more_comments(&self, item_id: ItemId) -> Result<usize, ClientError> {
        let cursor_state = self
            .threads()
            .get(&item_id)
            .filter(|t| t.synced)
            .map(|t| t.next_cursor.clone());

        let cursor = match cursor_state {
            Some(Some(cursor)) => cursor,
            Some(None) => return Ok(0),
            None => {
                let before = self.cached_len(item_id);
                let comments = self.get_comments(item_id).await?;
                return Ok(comments.len().saturating_sub(before));
            }
        };

        debug!(item_id, %cursor, "loading more comments");
        let page = match self.client.fetch_comments(item_id, Some(&cursor), self.limit).await {
            Ok(page) => page,
            Err(e) => {
                warn!(item_id, error = %e, "comment page fetch failed");
                return Err(e);
            }
        };

        let mut threads = self.threads();
        let thread = threads.entry(item_id).or_default();
        // a concurrent call may already have moved past this cursor
        let stale = thread.next_cursor.as_deref() != Some(cursor.as_str());
        let (next_cursor, total) = (thread.next_cursor.clone(), thread.total);
        let added = thread.absorb(page);
        if stale {
            thread.next_cursor = next_cursor;
            thread.total = total;
        }
        debug!(item_id, added, more = thread.next_cursor.is_some(), "comment page merged");
        Ok(added)
    }

    /// Puts a locally authored comment at the top of the item's thread.
    pub fn add_comment_to_cache(&self, item_id: ItemId, comment: Comment) {
        let mut threads = self.threads();
        let thread = threads.entry(item_id).or_default();
        let before = thread.comments.len();
        thread.comments.retain(|c| c.id != comment.id);
        if thread.comments.len() == before {
            thread.local = thread.local.saturating_add(1);
            thread.total = thread.total.saturating_add(1);
        }
        debug!(item_id, comment_id = comment.id, total = thread.total, "local comment cached");
        thread.comments.insert(0, comment);
    }

    /// Local comments first (local copy wins on id collisions), then the
    /// cached comments that share no id with them.
    pub fn merge_local_and_server(&self, item_id: ItemId, local: &[Comment]) -> Vec<Comment> {
        let mut seen = HashSet::new();
        let mut merged: Vec<Comment> = local
            .iter()
            .filter(|c| seen.insert(c.id))
            .cloned()
            .collect();

        if let Some(thread) = self.threads().get(&item_id) {
            merged.extend(
                thread
                    .comments
                    .iter()
                    .filter(|c| seen.insert(c.id))
                    .cloned(),
            );
        }
        merged
    }

    /// Flips the like state of a cached comment. Local only.
    pub fn toggle_comment_like(&self, item_id: ItemId, comment_id: CommentId) -> Option<Comment> {
        let mut threads = self.threads();
        let comment = threads
            .get_mut(&item_id)?
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id)?;
        comment.toggle_like();
        Some(comment.clone())
    }

    pub fn cached_comments(&self, item_id: ItemId) -> Option<Vec<Comment>> {
        self.threads().get(&item_id).map(|t| t.comments.clone())
    }

    pub fn thread_info(&self, item_id: ItemId) -> Option<ThreadInfo> {
        self.threads().get(&item_id).map(|t| ThreadInfo {
            total: t.total,
            next_cursor: t.next_cursor.clone(),
            cached: t.comments.len(),
            synced: t.synced,
        })
    }

    fn synced_comments(&self, item_id: ItemId) -> Option<Vec<Comment>> {
        self.threads()
            .get(&item_id)
            .filter(|t| t.synced)
            .map(|t| t.comments.clone())
    }

    fn cached_len(&self, item_id: ItemId) -> usize {
        self.threads().get(&item_id).map_or(0, |t| t.comments.len())
    }
}

/// Orders comments for display: each top-level comment followed by its
/// replies, top-level order preserved.
///
/// Replies are flattened onto their top-level ancestor. Replies whose
/// ancestor chain is not in `comments` are left out.
pub fn display_order(comments: &[Comment]) -> Vec<Comment> {
    let parents: HashMap<CommentId, Option<CommentId>> = comments
        .iter()
        .map(|c| (c.id, c.parent_comment_id))
        .collect();

    let root_of = |comment: &Comment| -> Option<CommentId> {
        let mut current = comment.parent_comment_id?;
        // bounded walk, a malformed cycle must not hang
        for _ in 0..comments.len() {
            match parents.get(&current)? {
                None => return Some(current),
                Some(parent) => current = *parent,
            }
        }
        None
    };

    let mut replies: HashMap<CommentId, Vec<&Comment>> = HashMap::new();
    for comment in comments.iter().filter(|c| c.is_reply()) {
        if let Some(root) = root_of(comment) {
            replies.entry(root).or_default().push(comment);
        }
    }

    let mut ordered = Vec::with_capacity(comments.len());
    for parent in comments.iter().filter(|c| !c.is_reply()) {
        ordered.push(parent.clone());
        if let Some(children) = replies.get(&parent.id) {
            ordered.extend(children.iter().map(|c| (*c).clone()));
        }
    }
    ordered
}
