use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Role level stored as an integer in the users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Member,
    Redactor,
    Admin,
}

impl Permission {
    pub fn from_db(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::Member),
            1 => Some(Self::Redactor),
            2 => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_db(&self) -> i16 {
        match self {
            Self::Member => 0,
            Self::Redactor => 1,
            Self::Admin => 2,
        }
    }

    /// Redactors and admins may edit or remove content they do not own.
    pub fn can_moderate(&self) -> bool {
        matches!(self, Self::Redactor | Self::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Next role up, if any.
    pub fn elevated(&self) -> Option<Self> {
        match self {
            Self::Member => Some(Self::Redactor),
            Self::Redactor => Some(Self::Admin),
            Self::Admin => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub permission: Permission,
    pub biography: Option<String>,
    pub avatar: Option<String>,
    /// Denormalized inbound-follow count, maintained by the social graph.
    pub followers: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Public projection of a user: no email, no credential material.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub permission: Permission,
    pub biography: Option<String>,
    pub avatar: Option<String>,
    pub followers: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            permission: user.permission,
            biography: user.biography,
            avatar: user.avatar,
            followers: user.followers,
            created_at: user.created_at,
        }
    }
}

/// The authenticated caller of an engine operation. Every mutating
/// operation takes this explicitly instead of reading ambient request
/// state.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub permission: Permission,
}
