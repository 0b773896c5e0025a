use std::sync::Arc;

use uuid::Uuid;

use crate::app::{EngineError, EngineResult};
use crate::domain::user::Actor;
use crate::store::{FollowOutcome, Store, UnfollowOutcome};

#[derive(Clone)]
pub struct SocialService {
    store: Arc<dyn Store>,
}

impl SocialService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Returns the followee's new inbound-follow counter. Edge insert
    /// and counter increment are one store transaction.
    pub async fn follow(&self, actor: &Actor, following_id: Uuid) -> EngineResult<i64> {
        if actor.id == following_id {
            return Err(EngineError::BadInput(
                "you cannot follow yourself".to_string(),
            ));
        }

        match self.store.add_follow(actor.id, following_id).await? {
            FollowOutcome::Followed { followers } => Ok(followers),
            FollowOutcome::AlreadyFollowing => {
                Err(EngineError::Conflict("you already follow this user"))
            }
            FollowOutcome::UserMissing => Err(EngineError::NotFound("user")),
        }
    }

    pub async fn unfollow(&self, actor: &Actor, following_id: Uuid) -> EngineResult<i64> {
        match self.store.remove_follow(actor.id, following_id).await? {
            UnfollowOutcome::Unfollowed { followers } => Ok(followers),
            UnfollowOutcome::NotFollowing => {
                Err(EngineError::Conflict("you do not follow this user"))
            }
        }
    }
}
