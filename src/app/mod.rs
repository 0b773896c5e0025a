pub mod auth;
pub mod engagement;
pub mod feed;
pub mod posts;
pub mod social;
pub mod users;

use thiserror::Error;

/// Typed failure surface of every engine operation. The HTTP layer owns
/// the mapping to transport status codes; the engine never swallows or
/// retries.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    BadInput(String),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
