use crate::{
    error::Result,
    models::user::*,
    state::AppState,
    utils::extract::JsonBody,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(upsert_user))
        .route("/search", get(search_users))
        .route("/complete-profile", post(complete_profile))
        .route("/:external_uid", get(get_user).put(update_user))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// 获取用户列表
/// GET /api/users
pub async fn list_users(State(app_state): State<Arc<AppState>>) -> Result<Json<Value>> {
    debug!("Fetching users list");

    let users: Vec<UserResponse> = app_state
        .user_service
        .list_users()
        .await?
        .iter()
        .map(User::to_response)
        .collect();

    Ok(Json(json!({
        "message": "Users fetched successfully",
        "count": users.len(),
        "users": users
    })))
}

/// 搜索用户
/// GET /api/users/search?q=
pub async fn search_users(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PublicUser>>> {
    let users = app_state
        .user_service
        .search_users(query.q.as_deref().unwrap_or_default())
        .await?;

    Ok(Json(users))
}

/// 根据外部身份ID获取用户资料
/// GET /api/users/:external_uid
pub async fn get_user(
    State(app_state): State<Arc<AppState>>,
    Path(external_uid): Path<String>,
) -> Result<Json<UserResponse>> {
    debug!("Fetching user profile: {}", external_uid);

    let user = app_state
        .user_service
        .get_by_external_uid(&external_uid)
        .await?;

    Ok(Json(user.to_response()))
}

/// 创建或更新用户资料
/// POST /api/users
pub async fn upsert_user(
    State(app_state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<UpsertUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = app_state.user_service.upsert_user(request).await?;

    Ok((StatusCode::CREATED, Json(user.to_response())))
}

/// 完善用户资料
/// POST /api/users/complete-profile
pub async fn complete_profile(
    State(app_state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<CompleteProfileRequest>,
) -> Result<Json<UserResponse>> {
    let user = app_state.user_service.complete_profile(request).await?;

    info!("Profile completed for user: {}", user.external_uid);

    Ok(Json(user.to_response()))
}

/// 更新用户资料
/// PUT /api/users/:external_uid
pub async fn update_user(
    State(app_state): State<Arc<AppState>>,
    Path(external_uid): Path<String>,
    JsonBody(request): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let user = app_state
        .user_service
        .update_user(&external_uid, request)
        .await?;

    Ok(Json(user.to_response()))
}
