use std::sync::Arc;

use uuid::Uuid;

use crate::app::feed::FeedService;
use crate::app::{EngineError, EngineResult};
use crate::domain::post::{Post, PostDetail, PostPatch};
use crate::domain::user::Actor;
use crate::store::{NewPost, Store};

/// Comments eagerly loaded on a detail read.
const DETAIL_COMMENT_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn Store>,
    feed: FeedService,
}

impl PostService {
    pub fn new(store: Arc<dyn Store>, feed: FeedService) -> Self {
        Self { store, feed }
    }

    /// Length validation happens upstream in the presentation layer;
    /// the engine assumes `content`, `tags` and `image` are in range.
    pub async fn create_post(
        &self,
        author: &Actor,
        content: String,
        tags: String,
        image: String,
    ) -> EngineResult<Post> {
        let post = self
            .store
            .insert_post(NewPost {
                author_id: author.id,
                content,
                tags,
                image,
            })
            .await?;

        // Best-effort post-commit side effect: a feed failure never
        // rolls back or fails the create.
        self.feed.spawn_regenerate();

        Ok(post)
    }

    pub async fn list_posts(
        &self,
        limit: Option<i64>,
        page: Option<i64>,
    ) -> EngineResult<Vec<Post>> {
        let offset = match (limit, page) {
            (Some(limit), Some(page)) => Some(
                limit
                    .checked_mul(page)
                    .ok_or_else(|| EngineError::BadInput("page is out of range".to_string()))?,
            ),
            _ => None,
        };

        Ok(self.store.list_posts(limit, offset).await?)
    }

    pub async fn list_by_author(&self, author_id: Uuid) -> EngineResult<Vec<Post>> {
        Ok(self.store.list_posts_by_author(author_id).await?)
    }

    pub async fn get_detail(
        &self,
        post_id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> EngineResult<PostDetail> {
        let mut post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or(EngineError::NotFound("post"))?;

        post.comments = Some(
            self.store
                .list_comments(post_id, DETAIL_COMMENT_LIMIT)
                .await?,
        );
        let comment_count = self.store.comment_count(post_id).await?;
        let has_liked = match viewer_id {
            Some(viewer_id) => self.store.has_liked(viewer_id, post_id).await?,
            None => false,
        };

        Ok(PostDetail {
            post,
            has_liked,
            comment_count,
        })
    }

    pub async fn update_post(
        &self,
        post_id: Uuid,
        actor: &Actor,
        patch: PostPatch,
    ) -> EngineResult<Post> {
        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or(EngineError::NotFound("post"))?;

        if post.author.id != actor.id && !actor.permission.can_moderate() {
            return Err(EngineError::Unauthorized(
                "you do not have permission to edit this post",
            ));
        }

        // An all-empty patch is a no-op; don't bump updated_at.
        if patch.is_empty() {
            return Ok(post);
        }

        self.store
            .update_post(post_id, patch)
            .await?
            .ok_or(EngineError::NotFound("post"))
    }

    pub async fn delete_post(&self, post_id: Uuid, actor: &Actor) -> EngineResult<()> {
        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or(EngineError::NotFound("post"))?;

        if post.author.id != actor.id && !actor.permission.can_moderate() {
            return Err(EngineError::Unauthorized(
                "you do not have permission to delete this post",
            ));
        }

        if !self.store.delete_post(post_id).await? {
            return Err(EngineError::NotFound("post"));
        }

        Ok(())
    }
}
