use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::AppendHeaders,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::engagement::EngagementService;
use crate::app::feed::FeedService;
use crate::app::posts::PostService;
use crate::app::social::SocialService;
use crate::app::users::UserService;
use crate::domain::engagement::Comment;
use crate::domain::post::{Post, PostPatch};
use crate::domain::user::PublicUser;
use crate::http::auth::bearer_token;
use crate::http::{validation, AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.store.list_users().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();
    validation::validate_registration(&username, &email, &payload.password)
        .map_err(AppError::validation)?;

    let service = UserService::new(state.store.clone());
    let user = service.register(username, email, &payload.password).await?;

    Ok(Json(user.into()))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }

    let service = AuthService::new(state.store.clone(), state.session_ttl_hours);
    let session = service.login(payload.email.trim(), &payload.password).await?;

    Ok(Json(SessionResponse {
        token: session.token,
        expires_at: session.expires_at,
    }))
}

pub async fn logout(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let token = bearer_token(&headers)?;

    let service = AuthService::new(state.store.clone(), state.session_ttl_hours);
    service.logout(token).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to log out");
        AppError::internal("failed to log out")
    })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let service = UserService::new(state.store.clone());
    let user = service.get_user(auth.user_id).await?;

    Ok(Json(user.into()))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let service = UserService::new(state.store.clone());
    let users = service.list_users().await?;

    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

pub async fn get_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let service = UserService::new(state.store.clone());
    let user = service.get_user(id).await?;

    Ok(Json(user.into()))
}

pub async fn list_user_posts(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Post>>, AppError> {
    let service = UserService::new(state.store.clone());
    service.get_user(id).await?;

    let posts = PostService::new(
        state.store.clone(),
        FeedService::new(state.store.clone(), state.feed.clone()),
    );
    let posts = posts.list_by_author(id).await?;

    Ok(Json(posts))
}

pub async fn delete_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = UserService::new(state.store.clone());
    service.delete_user(id, &auth.actor()).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn upgrade_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let service = UserService::new(state.store.clone());
    let user = service.upgrade(id, &auth.actor()).await?;

    Ok(Json(user.into()))
}

#[derive(Serialize)]
pub struct FollowResponse {
    pub followers: i64,
}

pub async fn follow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    let service = SocialService::new(state.store.clone());
    let followers = service.follow(&auth.actor(), id).await?;

    Ok(Json(FollowResponse { followers }))
}

pub async fn unfollow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    let service = SocialService::new(state.store.clone());
    let followers = service.unfollow(&auth.actor(), id).await?;

    Ok(Json(FollowResponse { followers }))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

fn post_service(state: &AppState) -> PostService {
    PostService::new(
        state.store.clone(),
        FeedService::new(state.store.clone(), state.feed.clone()),
    )
}

#[derive(Deserialize)]
pub struct ListPostsQuery {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<Vec<Post>>, AppError> {
    validation::validate_list_params(query.limit, query.page)
        .map_err(AppError::validation)?;

    let posts = post_service(&state)
        .list_posts(query.limit, query.page)
        .await?;

    Ok(Json(posts))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<(AppendHeaders<[(&'static str, String); 2]>, Json<Post>), AppError> {
    let viewer_id = auth.map(|user| user.user_id);
    let detail = post_service(&state).get_detail(id, viewer_id).await?;

    // Engagement metadata rides on headers, not the post body.
    Ok((
        AppendHeaders([
            ("x-has-liked", detail.has_liked.to_string()),
            ("x-comment-count", detail.comment_count.to_string()),
        ]),
        Json(detail.post),
    ))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub tags: String,
    pub image: String,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let content = payload.content.trim().to_string();
    let tags = payload.tags.trim().to_string();
    let image = payload.image.trim().to_string();
    validation::validate_new_post(&content, &tags, &image).map_err(AppError::validation)?;

    let post = post_service(&state)
        .create_post(&auth.actor(), content, tags, image)
        .await?;

    Ok(Json(post))
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub image: Option<String>,
    pub tags: Option<String>,
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let patch = PostPatch {
        content: payload.content.map(|v| v.trim().to_string()),
        image: payload.image.map(|v| v.trim().to_string()),
        tags: payload.tags.map(|v| v.trim().to_string()),
    };
    validation::validate_post_patch(
        patch.content.as_deref(),
        patch.tags.as_deref(),
        patch.image.as_deref(),
    )
    .map_err(AppError::validation)?;

    let post = post_service(&state)
        .update_post(id, &auth.actor(), patch)
        .await?;

    Ok(Json(post))
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    post_service(&state).delete_post(id, &auth.actor()).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct LikeResponse {
    pub likes_count: i64,
}

pub async fn like_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, AppError> {
    let service = EngagementService::new(state.store.clone());
    let likes_count = service.like(&auth.actor(), id).await?;

    Ok(Json(LikeResponse { likes_count }))
}

pub async fn unlike_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, AppError> {
    let service = EngagementService::new(state.store.clone());
    let likes_count = service.unlike(&auth.actor(), id).await?;

    Ok(Json(LikeResponse { likes_count }))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

pub async fn comment_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<Comment>, AppError> {
    let content = payload.content.trim().to_string();
    validation::validate_comment(&content).map_err(AppError::validation)?;

    let service = EngagementService::new(state.store.clone());
    let comment = service.comment(&auth.actor(), id, content).await?;

    Ok(Json(comment))
}
