use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::engagement::Comment;
use crate::domain::post::{AuthorSummary, Post, PostPatch};
use crate::domain::user::{Permission, User};
use crate::store::{
    CreateUserOutcome, FollowOutcome, LikeOutcome, NewPost, NewUser, Session, Store,
    UnfollowOutcome, UnlikeOutcome,
};

const POST_COLUMNS: &str = "p.id, p.author_id, u.username AS author_username, \
     u.avatar AS author_avatar, p.content, p.tags, p.image, p.likes_count, \
     p.created_at, p.updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let permission: i16 = row.get("permission");
    let permission = Permission::from_db(permission)
        .ok_or_else(|| anyhow!("unknown permission level: {}", permission))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        permission,
        biography: row.get("biography"),
        avatar: row.get("avatar"),
        followers: row.get("followers"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        author: AuthorSummary {
            id: row.get("author_id"),
            username: row.get("author_username"),
            avatar: row.get("author_avatar"),
        },
        content: row.get("content"),
        tags: row.get("tags"),
        image: row.get("image"),
        likes_count: row.get("likes_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        comments: None,
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        user_id: row.get("user_id"),
        post_id: row.get("post_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome> {
        let mut tx = self.pool.begin().await?;

        let username_taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(&user.username)
                .fetch_one(&mut *tx)
                .await?;
        if username_taken {
            return Ok(CreateUserOutcome::DuplicateUsername);
        }

        let email_taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(&user.email)
                .fetch_one(&mut *tx)
                .await?;
        if email_taken {
            return Ok(CreateUserOutcome::DuplicateEmail);
        }

        let row = sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, permission) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, username, email, password_hash, permission, biography, \
                       avatar, followers, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.permission.as_db())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CreateUserOutcome::Created(user_from_row(&row)?))
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, permission, biography, \
                    avatar, followers, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, permission, biography, \
                    avatar, followers, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, username, email, password_hash, permission, biography, \
                    avatar, followers, created_at, updated_at \
             FROM users ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Repair counters before the cascade removes this user's likes
        // and follow edges.
        sqlx::query(
            "UPDATE posts SET likes_count = GREATEST(likes_count - 1, 0) \
             WHERE id IN (SELECT post_id FROM likes WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE users SET followers = GREATEST(followers - 1, 0) \
             WHERE id IN (SELECT following_id FROM follows WHERE follower_id = $1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_permission(
        &self,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<Option<User>> {
        let row = sqlx::query(
            "UPDATE users SET permission = $2, updated_at = now() WHERE id = $1 \
             RETURNING id, username, email, password_hash, permission, biography, \
                       avatar, followers, created_at, updated_at",
        )
        .bind(user_id)
        .bind(permission.as_db())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            "SELECT user_id, expires_at FROM sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Session {
            user_id: row.get("user_id"),
            expires_at: row.get("expires_at"),
        }))
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let row = sqlx::query(&format!(
            "WITH inserted_post AS ( \
                INSERT INTO posts (id, author_id, content, tags, image, likes_count) \
                VALUES ($1, $2, $3, $4, $5, 0) \
                RETURNING id, author_id, content, tags, image, likes_count, \
                          created_at, updated_at \
             ) \
             SELECT {POST_COLUMNS} \
             FROM inserted_post p JOIN users u ON u.id = p.author_id",
        ))
        .bind(Uuid::new_v4())
        .bind(post.author_id)
        .bind(&post.content)
        .bind(&post.tags)
        .bind(&post.image)
        .fetch_one(&self.pool)
        .await?;

        Ok(post_from_row(&row))
    }

    async fn find_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p JOIN users u ON u.id = p.author_id \
             WHERE p.id = $1",
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn list_posts(&self, limit: Option<i64>, offset: Option<i64>) -> Result<Vec<Post>> {
        let base = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p JOIN users u ON u.id = p.author_id \
             ORDER BY p.created_at DESC, p.id DESC",
        );

        let rows = match (limit, offset) {
            (Some(limit), Some(offset)) => {
                sqlx::query(&format!("{base} OFFSET $1 LIMIT $2"))
                    .bind(offset)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            (Some(limit), None) => {
                sqlx::query(&format!("{base} LIMIT $1"))
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            _ => sqlx::query(&base).fetch_all(&self.pool).await?,
        };

        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn list_posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p JOIN users u ON u.id = p.author_id \
             WHERE p.author_id = $1 \
             ORDER BY p.created_at DESC, p.id DESC",
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn latest_posts(&self, count: i64) -> Result<Vec<Post>> {
        self.list_posts(Some(count), None).await
    }

    async fn update_post(&self, post_id: Uuid, patch: PostPatch) -> Result<Option<Post>> {
        let row = sqlx::query(&format!(
            "WITH updated_post AS ( \
                UPDATE posts \
                SET content = COALESCE($2, content), \
                    image = COALESCE($3, image), \
                    tags = COALESCE($4, tags), \
                    updated_at = now() \
                WHERE id = $1 \
                RETURNING id, author_id, content, tags, image, likes_count, \
                          created_at, updated_at \
             ) \
             SELECT {POST_COLUMNS} \
             FROM updated_post p JOIN users u ON u.id = p.author_id",
        ))
        .bind(post_id)
        .bind(patch.content)
        .bind(patch.image)
        .bind(patch.tags)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        // Likes and comments go with the post via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_like(&self, user_id: Uuid, post_id: Uuid) -> Result<LikeOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent likes for the same post and
        // doubles as the existence check.
        let post: Option<i64> =
            sqlx::query_scalar("SELECT likes_count FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;
        if post.is_none() {
            return Ok(LikeOutcome::PostMissing);
        }

        let inserted = sqlx::query(
            "INSERT INTO likes (id, user_id, post_id) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, post_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(post_id)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(LikeOutcome::AlreadyLiked);
        }

        let likes_count: i64 = sqlx::query_scalar(
            "UPDATE posts SET likes_count = likes_count + 1 WHERE id = $1 \
             RETURNING likes_count",
        )
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(LikeOutcome::Liked { likes_count })
    }

    async fn remove_like(&self, user_id: Uuid, post_id: Uuid) -> Result<UnlikeOutcome> {
        let mut tx = self.pool.begin().await?;

        let post: Option<i64> =
            sqlx::query_scalar("SELECT likes_count FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;
        if post.is_none() {
            return Ok(UnlikeOutcome::PostMissing);
        }

        let deleted = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Ok(UnlikeOutcome::NotLiked);
        }

        let likes_count: i64 = sqlx::query_scalar(
            "UPDATE posts SET likes_count = GREATEST(likes_count - 1, 0) WHERE id = $1 \
             RETURNING likes_count",
        )
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(UnlikeOutcome::Unliked { likes_count })
    }

    async fn has_liked(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let liked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(liked)
    }

    async fn like_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn add_follow(&self, follower_id: Uuid, following_id: Uuid) -> Result<FollowOutcome> {
        let mut tx = self.pool.begin().await?;

        let follower_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(follower_id)
                .fetch_one(&mut *tx)
                .await?;
        if !follower_exists {
            return Ok(FollowOutcome::UserMissing);
        }

        let followee: Option<i64> =
            sqlx::query_scalar("SELECT followers FROM users WHERE id = $1 FOR UPDATE")
                .bind(following_id)
                .fetch_optional(&mut *tx)
                .await?;
        if followee.is_none() {
            return Ok(FollowOutcome::UserMissing);
        }

        let inserted = sqlx::query(
            "INSERT INTO follows (follower_id, following_id) VALUES ($1, $2) \
             ON CONFLICT (follower_id, following_id) DO NOTHING",
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        let followers: i64 = sqlx::query_scalar(
            "UPDATE users SET followers = followers + 1 WHERE id = $1 RETURNING followers",
        )
        .bind(following_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(FollowOutcome::Followed { followers })
    }

    async fn remove_follow(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> Result<UnfollowOutcome> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND following_id = $2",
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&mut *tx)
        .await?;
        if deleted.rows_affected() == 0 {
            return Ok(UnfollowOutcome::NotFollowing);
        }

        let followers: i64 = sqlx::query_scalar(
            "UPDATE users SET followers = GREATEST(followers - 1, 0) WHERE id = $1 \
             RETURNING followers",
        )
        .bind(following_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);

        tx.commit().await?;

        Ok(UnfollowOutcome::Unfollowed { followers })
    }

    async fn insert_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "INSERT INTO comments (id, post_id, user_id, content) \
             SELECT $1, $2, $3, $4 \
             WHERE EXISTS (SELECT 1 FROM posts WHERE id = $2) \
             RETURNING id, post_id, user_id, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    async fn list_comments(&self, post_id: Uuid, limit: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, post_id, user_id, content, created_at \
             FROM comments WHERE post_id = $1 \
             ORDER BY created_at ASC, id ASC \
             LIMIT $2",
        )
        .bind(post_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    async fn comment_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
                .bind(post_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
