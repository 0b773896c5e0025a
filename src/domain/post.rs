use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::engagement::Comment;

/// Author fields embedded in post reads so list/detail responses never
/// require a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author: AuthorSummary,
    pub content: String,
    pub tags: String,
    pub image: String,
    /// Denormalized; equals the number of like rows for this post.
    pub likes_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Populated on detail reads only; list responses omit the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
}

/// A post plus the engagement metadata that is not part of the stored
/// row. The HTTP layer delivers the extra values as response headers.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Post,
    pub has_liked: bool,
    pub comment_count: i64,
}

/// Fields a caller may change on an existing post. Anything else
/// submitted upstream is dropped before it reaches the engine.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub content: Option<String>,
    pub image: Option<String>,
    pub tags: Option<String>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.image.is_none() && self.tags.is_none()
    }
}
