use std::sync::Arc;

use uuid::Uuid;

use crate::app::{EngineError, EngineResult};
use crate::domain::engagement::Comment;
use crate::domain::user::Actor;
use crate::store::{LikeOutcome, Store, UnlikeOutcome};

#[derive(Clone)]
pub struct EngagementService {
    store: Arc<dyn Store>,
}

impl EngagementService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Returns the post's new like counter. The duplicate check, the
    /// row insert and the counter increment are one store transaction.
    pub async fn like(&self, actor: &Actor, post_id: Uuid) -> EngineResult<i64> {
        match self.store.add_like(actor.id, post_id).await? {
            LikeOutcome::Liked { likes_count } => Ok(likes_count),
            LikeOutcome::AlreadyLiked => {
                Err(EngineError::Conflict("you have already liked this post"))
            }
            LikeOutcome::PostMissing => Err(EngineError::NotFound("post")),
        }
    }

    pub async fn unlike(&self, actor: &Actor, post_id: Uuid) -> EngineResult<i64> {
        match self.store.remove_like(actor.id, post_id).await? {
            UnlikeOutcome::Unliked { likes_count } => Ok(likes_count),
            UnlikeOutcome::NotLiked => {
                Err(EngineError::Conflict("you have not liked this post"))
            }
            UnlikeOutcome::PostMissing => Err(EngineError::NotFound("post")),
        }
    }

    /// Content validation is an upstream precondition.
    pub async fn comment(
        &self,
        actor: &Actor,
        post_id: Uuid,
        content: String,
    ) -> EngineResult<Comment> {
        self.store
            .insert_comment(post_id, actor.id, content)
            .await?
            .ok_or(EngineError::NotFound("post"))
    }
}
