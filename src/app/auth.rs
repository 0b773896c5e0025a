use std::sync::Arc;

use anyhow::Result;
use argon2::password_hash::PasswordHash;
use argon2::{Argon2, PasswordVerifier};
use rand::RngCore;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use crate::app::{EngineError, EngineResult};
use crate::domain::user::Actor;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Opaque bearer-token identity provider. Tokens are random bytes
/// handed to the client; only their SHA-256 digest is stored.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    session_ttl_hours: u64,
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, session_ttl_hours: u64) -> Self {
        Self {
            store,
            session_ttl_hours,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> EngineResult<SessionToken> {
        // Same error for unknown email and bad password.
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or(EngineError::Unauthorized("invalid credentials"))?;

        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|_| EngineError::Unauthorized("invalid credentials"))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| EngineError::Unauthorized("invalid credentials"))?;

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let expires_at =
            OffsetDateTime::now_utc() + Duration::hours(self.session_ttl_hours as i64);

        self.store
            .insert_session(&token_digest(&token), user.id, expires_at)
            .await?;

        Ok(SessionToken { token, expires_at })
    }

    /// Resolves a bearer token to the acting user, or `None` when the
    /// token is unknown or expired.
    pub async fn authenticate(&self, token: &str) -> Result<Option<Actor>> {
        let digest = token_digest(token);

        let Some(session) = self.store.find_session(&digest).await? else {
            return Ok(None);
        };
        if session.expires_at <= OffsetDateTime::now_utc() {
            self.store.delete_session(&digest).await?;
            return Ok(None);
        }

        let Some(user) = self.store.find_user(session.user_id).await? else {
            return Ok(None);
        };

        Ok(Some(Actor {
            id: user.id,
            permission: user.permission,
        }))
    }

    pub async fn logout(&self, token: &str) -> Result<bool> {
        self.store.delete_session(&token_digest(token)).await
    }
}
