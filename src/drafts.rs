use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tracing::debug;

use crate::error::DraftError;
use crate::models::{Comment, CommentId, ItemId};

static LAST_LOCAL_ID: AtomicI64 = AtomicI64::new(0);

/// Next id for a locally authored comment.
///
/// Ids are negative so they never collide with server ids, and strictly
/// decreasing within the process. The sequence is seeded from the current
/// time so ids stay unique across restarts too.
pub fn next_local_id() -> CommentId {
    let seed = -Utc::now().timestamp_millis().max(1);
    let mut last = LAST_LOCAL_ID.load(Ordering::SeqCst);
    loop {
        let next = if last == 0 { seed } else { (last - 1).min(seed) };
        match LAST_LOCAL_ID.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Builds a local comment, optionally as a reply.
///
/// Replies attach to the top-level comment of the thread they answer, so
/// replying to a reply keeps the single nesting level.
pub fn compose_comment(
    content: &str,
    author: &str,
    reply_to: Option<&Comment>,
) -> Result<Comment, DraftError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(DraftError::EmptyContent);
    }

    Ok(Comment {
        id: next_local_id(),
        parent_comment_id: reply_to.map(|c| c.parent_comment_id.unwrap_or(c.id)),
        author_name: author.to_string(),
        avatar_url: String::new(),
        reply_to_username: reply_to.map(|c| c.author_name.clone()),
        content: content.to_string(),
        timestamp: Utc::now().format("%Y-%m-%d %H:%M").to_string(),
        location: String::new(),
        like_count: 0,
        is_liked: false,
    })
}

/// On-disk store for comments written locally and not yet seen on the server.
/// One JSON file per item under `<data_dir>/comments/`, newest comment first.
pub struct DraftStore {
    comments_dir: PathBuf,
}

impl DraftStore {
    /// Opens the store, creating the directory layout if needed.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, DraftError> {
        let comments_dir = data_dir.as_ref().join("comments");
        fs::create_dir_all(&comments_dir).map_err(|source| DraftError::Io {
            path: comments_dir.clone(),
            source,
        })?;
        Ok(Self { comments_dir })
    }

    fn path_for(&self, item_id: ItemId) -> PathBuf {
        self.comments_dir.join(format!("{}.json", item_id))
    }

    /// Drafts for an item; a missing file is an empty list.
    pub fn load(&self, item_id: ItemId) -> Result<Vec<Comment>, DraftError> {
        let path = self.path_for(item_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(DraftError::Io { path, source }),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Adds a draft at the front and returns the updated list.
    pub fn push(&self, item_id: ItemId, comment: Comment) -> Result<Vec<Comment>, DraftError> {
        let mut drafts = self.load(item_id)?;
        drafts.retain(|c| c.id != comment.id);
        drafts.insert(0, comment);
        self.replace(item_id, &drafts)?;
        Ok(drafts)
    }

    /// Overwrites the stored draft with the same id. Returns false if absent.
    pub fn update(&self, item_id: ItemId, comment: &Comment) -> Result<bool, DraftError> {
        let mut drafts = self.load(item_id)?;
        let Some(slot) = drafts.iter_mut().find(|c| c.id == comment.id) else {
            return Ok(false);
        };
        *slot = comment.clone();
        self.replace(item_id, &drafts)?;
        Ok(true)
    }

    pub fn replace(&self, item_id: ItemId, comments: &[Comment]) -> Result<(), DraftError> {
        let path = self.path_for(item_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(comments)?;

        fs::write(&tmp, json).map_err(|source| DraftError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| DraftError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(item_id, count = comments.len(), "drafts saved");
        Ok(())
    }

    pub fn clear(&self, item_id: ItemId) -> Result<(), DraftError> {
        let path = self.path_for(item_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(DraftError::Io { path, source }),
        }
    }

    /// Items that currently have stored drafts, ascending.
    pub fn items_with_drafts(&self) -> Result<Vec<ItemId>, DraftError> {
        let entries = fs::read_dir(&self.comments_dir).map_err(|source| DraftError::Io {
            path: self.comments_dir.clone(),
            source,
        })?;

        let mut ids: Vec<ItemId> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                if path.extension().map_or(false, |ext| ext == "json") {
                    path.file_stem()?.to_str()?.parse().ok()
                } else {
                    None
                }
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "drafts_tests.rs"]
mod tests;
