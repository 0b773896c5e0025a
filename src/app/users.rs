use std::sync::Arc;

use anyhow::anyhow;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use uuid::Uuid;

use crate::app::{EngineError, EngineResult};
use crate::domain::user::{Actor, Permission, User};
use crate::store::{CreateUserOutcome, NewUser, Store};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn register(
        &self,
        username: String,
        email: String,
        password: &str,
    ) -> EngineResult<User> {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| anyhow!("failed to hash password: {err}"))?
            .to_string();

        match self
            .store
            .create_user(NewUser {
                username,
                email,
                password_hash,
                permission: Permission::Member,
            })
            .await?
        {
            CreateUserOutcome::Created(user) => Ok(user),
            CreateUserOutcome::DuplicateUsername => {
                Err(EngineError::Conflict("username already taken"))
            }
            CreateUserOutcome::DuplicateEmail => {
                Err(EngineError::Conflict("email already registered"))
            }
        }
    }

    pub async fn get_user(&self, user_id: Uuid) -> EngineResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(EngineError::NotFound("user"))
    }

    pub async fn list_users(&self) -> EngineResult<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    /// Users may delete themselves; admins may delete anyone.
    pub async fn delete_user(&self, user_id: Uuid, actor: &Actor) -> EngineResult<()> {
        if user_id != actor.id && !actor.permission.is_admin() {
            return Err(EngineError::Unauthorized(
                "you do not have permission to delete this account",
            ));
        }

        if !self.store.delete_user(user_id).await? {
            return Err(EngineError::NotFound("user"));
        }

        Ok(())
    }

    /// Admin-only: raise a user's permission one level.
    pub async fn upgrade(&self, user_id: Uuid, actor: &Actor) -> EngineResult<User> {
        if !actor.permission.is_admin() {
            return Err(EngineError::Unauthorized(
                "only admins can change permissions",
            ));
        }

        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or(EngineError::NotFound("user"))?;

        let next = user
            .permission
            .elevated()
            .ok_or(EngineError::Conflict("user already has the highest permission"))?;

        self.store
            .set_permission(user_id, next)
            .await?
            .ok_or(EngineError::NotFound("user"))
    }
}
