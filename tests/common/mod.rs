#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use notefeed::{ClientError, Comment, CommentClient, CommentId, CommentPage, FeedClient, Item, ItemId};

pub fn item(id: ItemId) -> Item {
    Item {
        id,
        title: format!("note {}", id),
        author_name: format!("author{}", id % 5),
        avatar_url: format!("https://img.example.com/avatar/{}.png", id),
        cover_url: format!("https://img.example.com/cover/{}.png", id),
        cover_width: 720,
        cover_height: 960,
        like_count: 0,
        is_liked: false,
        is_video: false,
        images: Vec::new(),
    }
}

pub fn items(ids: impl IntoIterator<Item = ItemId>) -> Vec<Item> {
    ids.into_iter().map(item).collect()
}

pub fn comment(id: CommentId, parent: Option<CommentId>) -> Comment {
    Comment {
        id,
        parent_comment_id: parent,
        author_name: format!("user{}", id),
        avatar_url: String::new(),
        reply_to_username: None,
        content: format!("comment {}", id),
        timestamp: "3h".to_string(),
        location: "Chengdu".to_string(),
        like_count: 1,
        is_liked: false,
    }
}

/// Holds one call until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.release.notify_one();
    }
}

/// Feed backend scripted per page number. Unscripted pages come back empty.
#[derive(Default)]
pub struct FakeFeed {
    pages: Mutex<HashMap<u32, VecDeque<Result<Vec<Item>, ClientError>>>>,
    gates: Mutex<HashMap<usize, Arc<Gate>>>,
    requested: Mutex<Vec<u32>>,
    calls: AtomicUsize,
}

impl FakeFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, page: u32, result: Result<Vec<Item>, ClientError>) {
        self.pages
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .push_back(result);
    }

    /// Gates the `call`-th fetch (0-based, counted across all pages).
    pub fn gate_call(&self, call: usize) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().unwrap().insert(call, gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedClient for FakeFeed {
    async fn fetch_page(&self, page: u32, _page_size: u32) -> Result<Vec<Item>, ClientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(page);

        let gate = self.gates.lock().unwrap().get(&call).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let scripted = self
            .pages
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Comment backend scripted per (item, cursor).
#[derive(Default)]
pub struct FakeComments {
    pages: Mutex<HashMap<(ItemId, Option<String>), VecDeque<Result<CommentPage, ClientError>>>>,
    gates: Mutex<HashMap<usize, Arc<Gate>>>,
    calls: AtomicUsize,
}

impl FakeComments {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, item_id: ItemId, cursor: Option<&str>, result: Result<CommentPage, ClientError>) {
        self.pages
            .lock()
            .unwrap()
            .entry((item_id, cursor.map(str::to_string)))
            .or_default()
            .push_back(result);
    }

    pub fn gate_call(&self, call: usize) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().unwrap().insert(call, gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommentClient for FakeComments {
    async fn fetch_comments(
        &self,
        item_id: ItemId,
        cursor: Option<&str>,
        _limit: u32,
    ) -> Result<CommentPage, ClientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().unwrap().get(&call).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let scripted = self
            .pages
            .lock()
            .unwrap()
            .get_mut(&(item_id, cursor.map(str::to_string)))
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| Ok(CommentPage::default()))
    }
}

pub fn comment_page(list: Vec<Comment>, next_cursor: Option<&str>, total: u32) -> CommentPage {
    CommentPage {
        total,
        next_cursor: next_cursor.map(str::to_string),
        list,
    }
}
