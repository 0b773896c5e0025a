//! In-memory [`Store`] used by the HTTP test suite. Every mutating
//! operation runs under a single write lock, which gives it the same
//! atomicity guarantees the Postgres store gets from transactions.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::engagement::Comment;
use crate::domain::post::{AuthorSummary, Post, PostPatch};
use crate::domain::user::{Permission, User};
use crate::store::{
    CreateUserOutcome, FollowOutcome, LikeOutcome, NewPost, NewUser, Session, Store,
    UnfollowOutcome, UnlikeOutcome,
};

#[derive(Debug, Clone)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    content: String,
    tags: String,
    image: String,
    likes_count: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    seq: u64,
}

#[derive(Debug, Clone)]
struct LikeRow {
    user_id: Uuid,
    post_id: Uuid,
}

#[derive(Debug, Clone)]
struct FollowRow {
    follower_id: Uuid,
    following_id: Uuid,
}

#[derive(Debug, Clone)]
struct CommentRow {
    comment: Comment,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    posts: HashMap<Uuid, PostRow>,
    likes: Vec<LikeRow>,
    follows: Vec<FollowRow>,
    comments: Vec<CommentRow>,
    // Monotonic insertion counter; breaks creation-time ties so ordering
    // stays stable even when timestamps collide.
    seq: u64,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn materialize(&self, row: &PostRow) -> Result<Post> {
        let author = self
            .users
            .get(&row.author_id)
            .ok_or_else(|| anyhow!("post {} has no author row", row.id))?;

        Ok(Post {
            id: row.id,
            author: AuthorSummary {
                id: author.id,
                username: author.username.clone(),
                avatar: author.avatar.clone(),
            },
            content: row.content.clone(),
            tags: row.tags.clone(),
            image: row.image.clone(),
            likes_count: row.likes_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            comments: None,
        })
    }

    fn posts_newest_first(&self) -> Vec<&PostRow> {
        let mut rows: Vec<&PostRow> = self.posts.values().collect();
        rows.sort_by(|a, b| b.seq.cmp(&a.seq));
        rows
    }
}

#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.username == user.username) {
            return Ok(CreateUserOutcome::DuplicateUsername);
        }
        if inner.users.values().any(|u| u.email == user.email) {
            return Ok(CreateUserOutcome::DuplicateEmail);
        }

        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            permission: user.permission,
            biography: None,
            avatar: None,
            followers: 0,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(created.id, created.clone());

        Ok(CreateUserOutcome::Created(created))
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;

        if inner.users.remove(&user_id).is_none() {
            return Ok(false);
        }

        // Repair counters touched by this user's likes and follows.
        let liked_posts: Vec<Uuid> = inner
            .likes
            .iter()
            .filter(|l| l.user_id == user_id)
            .map(|l| l.post_id)
            .collect();
        for post_id in liked_posts {
            if let Some(post) = inner.posts.get_mut(&post_id) {
                post.likes_count = (post.likes_count - 1).max(0);
            }
        }
        let followed: Vec<Uuid> = inner
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id)
            .map(|f| f.following_id)
            .collect();
        for following_id in followed {
            if let Some(user) = inner.users.get_mut(&following_id) {
                user.followers = (user.followers - 1).max(0);
            }
        }

        // Cascade: posts authored by the user, then rows referencing
        // either the user or the removed posts.
        let removed_posts: Vec<Uuid> = inner
            .posts
            .values()
            .filter(|p| p.author_id == user_id)
            .map(|p| p.id)
            .collect();
        inner.posts.retain(|_, p| p.author_id != user_id);
        inner.likes.retain(|l| {
            l.user_id != user_id && !removed_posts.contains(&l.post_id)
        });
        inner.follows.retain(|f| {
            f.follower_id != user_id && f.following_id != user_id
        });
        inner.comments.retain(|c| {
            c.comment.user_id != user_id && !removed_posts.contains(&c.comment.post_id)
        });
        inner.sessions.retain(|_, s| s.user_id != user_id);

        Ok(true)
    }

    async fn set_permission(
        &self,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<Option<User>> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(None);
        };
        user.permission = permission;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.sessions.insert(
            token_hash.to_string(),
            Session {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.sessions.remove(token_hash).is_some())
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let mut inner = self.inner.write().await;

        if !inner.users.contains_key(&post.author_id) {
            return Err(anyhow!("author {} does not exist", post.author_id));
        }

        let now = OffsetDateTime::now_utc();
        let seq = inner.next_seq();
        let row = PostRow {
            id: Uuid::new_v4(),
            author_id: post.author_id,
            content: post.content,
            tags: post.tags,
            image: post.image,
            likes_count: 0,
            created_at: now,
            updated_at: now,
            seq,
        };
        let materialized = inner.materialize(&row)?;
        inner.posts.insert(row.id, row);

        Ok(materialized)
    }

    async fn find_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let inner = self.inner.read().await;
        inner
            .posts
            .get(&post_id)
            .map(|row| inner.materialize(row))
            .transpose()
    }

    async fn list_posts(&self, limit: Option<i64>, offset: Option<i64>) -> Result<Vec<Post>> {
        let inner = self.inner.read().await;
        let rows = inner.posts_newest_first();

        let offset = offset.unwrap_or(0).max(0) as usize;
        let limit = limit.map_or(usize::MAX, |l| l.max(0) as usize);

        rows.into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| inner.materialize(row))
            .collect()
    }

    async fn list_posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>> {
        let inner = self.inner.read().await;
        inner
            .posts_newest_first()
            .into_iter()
            .filter(|row| row.author_id == author_id)
            .map(|row| inner.materialize(row))
            .collect()
    }

    async fn latest_posts(&self, count: i64) -> Result<Vec<Post>> {
        self.list_posts(Some(count), None).await
    }

    async fn update_post(&self, post_id: Uuid, patch: PostPatch) -> Result<Option<Post>> {
        let mut inner = self.inner.write().await;

        let Some(mut row) = inner.posts.get(&post_id).cloned() else {
            return Ok(None);
        };
        if let Some(content) = patch.content {
            row.content = content;
        }
        if let Some(image) = patch.image {
            row.image = image;
        }
        if let Some(tags) = patch.tags {
            row.tags = tags;
        }
        row.updated_at = OffsetDateTime::now_utc();

        let materialized = inner.materialize(&row)?;
        inner.posts.insert(post_id, row);

        Ok(Some(materialized))
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;

        if inner.posts.remove(&post_id).is_none() {
            return Ok(false);
        }
        inner.likes.retain(|l| l.post_id != post_id);
        inner.comments.retain(|c| c.comment.post_id != post_id);

        Ok(true)
    }

    async fn add_like(&self, user_id: Uuid, post_id: Uuid) -> Result<LikeOutcome> {
        let mut inner = self.inner.write().await;

        if !inner.posts.contains_key(&post_id) {
            return Ok(LikeOutcome::PostMissing);
        }
        if inner
            .likes
            .iter()
            .any(|l| l.user_id == user_id && l.post_id == post_id)
        {
            return Ok(LikeOutcome::AlreadyLiked);
        }

        inner.likes.push(LikeRow { user_id, post_id });
        let post = inner
            .posts
            .get_mut(&post_id)
            .ok_or_else(|| anyhow!("post vanished mid-like"))?;
        post.likes_count += 1;

        Ok(LikeOutcome::Liked {
            likes_count: post.likes_count,
        })
    }

    async fn remove_like(&self, user_id: Uuid, post_id: Uuid) -> Result<UnlikeOutcome> {
        let mut inner = self.inner.write().await;

        if !inner.posts.contains_key(&post_id) {
            return Ok(UnlikeOutcome::PostMissing);
        }
        let before = inner.likes.len();
        inner
            .likes
            .retain(|l| !(l.user_id == user_id && l.post_id == post_id));
        if inner.likes.len() == before {
            return Ok(UnlikeOutcome::NotLiked);
        }

        let post = inner
            .posts
            .get_mut(&post_id)
            .ok_or_else(|| anyhow!("post vanished mid-unlike"))?;
        post.likes_count = (post.likes_count - 1).max(0);

        Ok(UnlikeOutcome::Unliked {
            likes_count: post.likes_count,
        })
    }

    async fn has_liked(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .likes
            .iter()
            .any(|l| l.user_id == user_id && l.post_id == post_id))
    }

    async fn like_count(&self, post_id: Uuid) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner.likes.iter().filter(|l| l.post_id == post_id).count() as i64)
    }

    async fn add_follow(&self, follower_id: Uuid, following_id: Uuid) -> Result<FollowOutcome> {
        let mut inner = self.inner.write().await;

        if !inner.users.contains_key(&follower_id) || !inner.users.contains_key(&following_id) {
            return Ok(FollowOutcome::UserMissing);
        }
        if inner
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id)
        {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        inner.follows.push(FollowRow {
            follower_id,
            following_id,
        });
        let followee = inner
            .users
            .get_mut(&following_id)
            .ok_or_else(|| anyhow!("followee vanished mid-follow"))?;
        followee.followers += 1;

        Ok(FollowOutcome::Followed {
            followers: followee.followers,
        })
    }

    async fn remove_follow(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<UnfollowOutcome> {
        let mut inner = self.inner.write().await;

        let before = inner.follows.len();
        inner
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
        if inner.follows.len() == before {
            return Ok(UnfollowOutcome::NotFollowing);
        }

        let followers = match inner.users.get_mut(&following_id) {
            Some(followee) => {
                followee.followers = (followee.followers - 1).max(0);
                followee.followers
            }
            None => 0,
        };

        Ok(UnfollowOutcome::Unfollowed { followers })
    }

    async fn insert_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Option<Comment>> {
        let mut inner = self.inner.write().await;

        if !inner.posts.contains_key(&post_id) {
            return Ok(None);
        }

        let seq = inner.next_seq();
        let comment = Comment {
            id: Uuid::new_v4(),
            user_id,
            post_id,
            content,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.comments.push(CommentRow {
            comment: comment.clone(),
            seq,
        });

        Ok(Some(comment))
    }

    async fn list_comments(&self, post_id: Uuid, limit: i64) -> Result<Vec<Comment>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<&CommentRow> = inner
            .comments
            .iter()
            .filter(|c| c.comment.post_id == post_id)
            .collect();
        rows.sort_by_key(|c| c.seq);

        Ok(rows
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|c| c.comment.clone())
            .collect())
    }

    async fn comment_count(&self, post_id: Uuid) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .comments
            .iter()
            .filter(|c| c.comment.post_id == post_id)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Permission;

    async fn seed_user(store: &MemStore, name: &str) -> User {
        match store
            .create_user(NewUser {
                username: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: "hash".to_string(),
                permission: Permission::Member,
            })
            .await
            .expect("create user")
        {
            CreateUserOutcome::Created(user) => user,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    async fn seed_post(store: &MemStore, author_id: Uuid) -> Post {
        store
            .insert_post(NewPost {
                author_id,
                content: "x".repeat(200),
                tags: "test".to_string(),
                image: "img.png".to_string(),
            })
            .await
            .expect("insert post")
    }

    #[tokio::test]
    async fn concurrent_likes_only_one_succeeds() {
        let store = MemStore::new();
        let user = seed_user(&store, "racer").await;
        let post = seed_post(&store, user.id).await;

        let (a, b) = tokio::join!(
            store.add_like(user.id, post.id),
            store.add_like(user.id, post.id),
        );

        let liked = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|o| matches!(o, LikeOutcome::Liked { .. }))
            .count();
        assert_eq!(liked, 1);
        assert_eq!(store.like_count(post.id).await.unwrap(), 1);
        let post = store.find_post(post.id).await.unwrap().unwrap();
        assert_eq!(post.likes_count, 1);
    }

    #[tokio::test]
    async fn counter_never_goes_negative() {
        let store = MemStore::new();
        let user = seed_user(&store, "clamp").await;
        let post = seed_post(&store, user.id).await;

        let outcome = store.remove_like(user.id, post.id).await.unwrap();
        assert!(matches!(outcome, UnlikeOutcome::NotLiked));
        let post = store.find_post(post.id).await.unwrap().unwrap();
        assert_eq!(post.likes_count, 0);
    }

    #[tokio::test]
    async fn deleting_a_liker_repairs_the_counter() {
        let store = MemStore::new();
        let author = seed_user(&store, "author").await;
        let liker = seed_user(&store, "liker").await;
        let post = seed_post(&store, author.id).await;

        store.add_like(liker.id, post.id).await.unwrap();
        store.delete_user(liker.id).await.unwrap();

        let post = store.find_post(post.id).await.unwrap().unwrap();
        assert_eq!(post.likes_count, 0);
        assert_eq!(store.like_count(post.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn follow_counters_track_edges() {
        let store = MemStore::new();
        let a = seed_user(&store, "follower").await;
        let b = seed_user(&store, "followee").await;

        let outcome = store.add_follow(a.id, b.id).await.unwrap();
        assert!(matches!(outcome, FollowOutcome::Followed { followers: 1 }));
        let outcome = store.add_follow(a.id, b.id).await.unwrap();
        assert!(matches!(outcome, FollowOutcome::AlreadyFollowing));

        let outcome = store.remove_follow(a.id, b.id).await.unwrap();
        assert!(matches!(
            outcome,
            UnfollowOutcome::Unfollowed { followers: 0 }
        ));
        let outcome = store.remove_follow(a.id, b.id).await.unwrap();
        assert!(matches!(outcome, UnfollowOutcome::NotFollowing));
    }
}
