use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ClientError;
use crate::models::{CommentPage, Envelope, FeedData, Item, ItemId};

/// Source of feed pages.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetches page `page` (1-based) holding at most `page_size` items.
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<Item>, ClientError>;
}

/// Source of comment threads.
#[async_trait]
pub trait CommentClient: Send + Sync {
    async fn fetch_comments(
        &self,
        item_id: ItemId,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<CommentPage, ClientError>;
}

/// HTTP client for the notes backend.
///
/// Build one at startup and share it (behind an `Arc`) with the feed
/// controller and the comment store.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("notefeed/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let response = self.http.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        decode_envelope(&bytes)
    }
}

#[async_trait]
impl FeedClient for ApiClient {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<Item>, ClientError> {
        let url = self.endpoint("feed");
        debug!(page, page_size, %url, "requesting feed page");

        let query = [("page", page.to_string()), ("limit", page_size.to_string())];
        match self.get::<FeedData>(&url, &query).await {
            Ok(data) => Ok(data.list),
            Err(ClientError::EmptyBody) => {
                warn!(page, "feed response had no usable body, treating as empty page");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CommentClient for ApiClient {
    async fn fetch_comments(
        &self,
        item_id: ItemId,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<CommentPage, ClientError> {
        let url = self.endpoint(&format!("comments/{}", item_id));
        debug!(item_id, ?cursor, limit, "requesting comments");

        let mut query = vec![("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        match self.get::<CommentPage>(&url, &query).await {
            Ok(page) => Ok(page),
            Err(ClientError::EmptyBody) => {
                warn!(item_id, "comment response had no usable body, treating as empty page");
                Ok(CommentPage::default())
            }
            Err(e) => Err(e),
        }
    }
}

/// Unwraps the `{code, msg, data}` envelope.
///
/// A payload that does not decode, or carries no `data`, yields
/// [`ClientError::EmptyBody`].
pub fn decode_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ClientError> {
    let envelope: Envelope<T> = match serde_json::from_slice(bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(error = %e, "failed to decode response envelope");
            return Err(ClientError::EmptyBody);
        }
    };

    if envelope.code != 0 {
        debug!(code = envelope.code, msg = %envelope.msg, "backend reported non-zero code");
    }

    envelope.data.ok_or(ClientError::EmptyBody)
}
