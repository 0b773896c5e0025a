//! Persistence seam. The engine talks to a [`Store`] trait whose
//! mutating operations are atomic as a unit: the duplicate-like check,
//! the like row insert, and the counter increment all happen inside one
//! store transaction (or one lock scope for the in-memory store), so
//! two concurrent likes for the same (user, post) pair can never both
//! succeed.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::engagement::Comment;
use crate::domain::post::{Post, PostPatch};
use crate::domain::user::{Permission, User};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub permission: Permission,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub content: String,
    pub tags: String,
    pub image: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(User),
    DuplicateUsername,
    DuplicateEmail,
}

#[derive(Debug, Clone, Copy)]
pub enum LikeOutcome {
    /// Like row inserted; the post's new counter value.
    Liked { likes_count: i64 },
    AlreadyLiked,
    PostMissing,
}

#[derive(Debug, Clone, Copy)]
pub enum UnlikeOutcome {
    Unliked { likes_count: i64 },
    NotLiked,
    PostMissing,
}

#[derive(Debug, Clone, Copy)]
pub enum FollowOutcome {
    /// Edge inserted; the followee's new inbound-follow counter.
    Followed { followers: i64 },
    AlreadyFollowing,
    UserMissing,
}

#[derive(Debug, Clone, Copy)]
pub enum UnfollowOutcome {
    Unfollowed { followers: i64 },
    NotFollowing,
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    // ---- users ----

    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome>;
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    /// Removes the user and every row referencing them, repairing the
    /// denormalized counters their likes and follows contributed to.
    async fn delete_user(&self, user_id: Uuid) -> Result<bool>;
    async fn set_permission(&self, user_id: Uuid, permission: Permission)
        -> Result<Option<User>>;

    // ---- sessions ----

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<()>;
    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>>;
    async fn delete_session(&self, token_hash: &str) -> Result<bool>;

    // ---- posts ----

    async fn insert_post(&self, post: NewPost) -> Result<Post>;
    async fn find_post(&self, post_id: Uuid) -> Result<Option<Post>>;
    /// Creation-descending. `offset` only ever accompanies `limit`.
    async fn list_posts(&self, limit: Option<i64>, offset: Option<i64>) -> Result<Vec<Post>>;
    async fn list_posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>>;
    async fn latest_posts(&self, count: i64) -> Result<Vec<Post>>;
    async fn update_post(&self, post_id: Uuid, patch: PostPatch) -> Result<Option<Post>>;
    async fn delete_post(&self, post_id: Uuid) -> Result<bool>;

    // ---- likes ----

    async fn add_like(&self, user_id: Uuid, post_id: Uuid) -> Result<LikeOutcome>;
    async fn remove_like(&self, user_id: Uuid, post_id: Uuid) -> Result<UnlikeOutcome>;
    async fn has_liked(&self, user_id: Uuid, post_id: Uuid) -> Result<bool>;
    /// Live count of like rows, independent of the denormalized counter.
    async fn like_count(&self, post_id: Uuid) -> Result<i64>;

    // ---- follows ----

    async fn add_follow(&self, follower_id: Uuid, following_id: Uuid) -> Result<FollowOutcome>;
    async fn remove_follow(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<UnfollowOutcome>;

    // ---- comments ----

    /// Returns `None` when the post does not exist.
    async fn insert_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Option<Comment>>;
    /// Oldest first, capped at `limit`.
    async fn list_comments(&self, post_id: Uuid, limit: i64) -> Result<Vec<Comment>>;
    async fn comment_count(&self, post_id: Uuid) -> Result<i64>;
}
