use serde::{de, Deserialize, Deserializer, Serialize};

pub type ItemId = i64;
pub type CommentId = i64;

/// A single note in the feed.
///
/// Display metadata is fixed once fetched; only `is_liked` and `like_count`
/// change locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    #[serde(rename = "userName")]
    pub author_name: String,
    #[serde(rename = "avatar", default)]
    pub avatar_url: String,
    #[serde(rename = "cover", default)]
    pub cover_url: String,
    #[serde(default)]
    pub cover_width: u32,
    #[serde(default)]
    pub cover_height: u32,
    #[serde(rename = "likes", default, deserialize_with = "deserialize_likes")]
    pub like_count: u32,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default, deserialize_with = "deserialize_nullable_vec")]
    pub images: Vec<String>,
}

impl Item {
    /// Flips the like state and adjusts the counter to match.
    pub fn toggle_like(&mut self) {
        if self.is_liked {
            self.like_count = self.like_count.saturating_sub(1);
        } else {
            self.like_count = self.like_count.saturating_add(1);
        }
        self.is_liked = !self.is_liked;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Server ids are positive; locally authored comments use negative ids.
    pub id: CommentId,
    #[serde(default)]
    pub parent_comment_id: Option<CommentId>,
    #[serde(rename = "userName")]
    pub author_name: String,
    #[serde(rename = "avatar", default)]
    pub avatar_url: String,
    #[serde(default)]
    pub reply_to_username: Option<String>,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "likes", default, deserialize_with = "deserialize_likes")]
    pub like_count: u32,
    #[serde(default)]
    pub is_liked: bool,
}

impl Comment {
    pub fn is_local(&self) -> bool {
        self.id < 0
    }

    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }

    pub fn toggle_like(&mut self) {
        if self.is_liked {
            self.like_count = self.like_count.saturating_sub(1);
        } else {
            self.like_count = self.like_count.saturating_add(1);
        }
        self.is_liked = !self.is_liked;
    }
}

/// One page of comments as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable_vec")]
    pub list: Vec<Comment>,
}

/// `{code, msg, data}` wrapper used by every backend response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedData {
    #[serde(default, deserialize_with = "deserialize_nullable_vec")]
    pub list: Vec<Item>,
}

// Older backend builds send `likes` as a numeric string, newer ones as a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum LikesRepr {
    Number(i64),
    Text(String),
}

fn deserialize_likes<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<LikesRepr>::deserialize(deserializer)? {
        None => return Ok(0),
        Some(LikesRepr::Number(n)) => n,
        Some(LikesRepr::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("likes is not numeric: {:?}", s)))?,
    };
    u32::try_from(raw).map_err(|_| de::Error::custom(format!("likes out of range: {}", raw)))
}

fn deserialize_nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
