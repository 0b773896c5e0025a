use axum::Router;
use tower_http::cors::CorsLayer;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;
pub mod validation;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::posts())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
