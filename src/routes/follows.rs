use crate::{
    error::Result,
    models::follow::*,
    models::user::PublicUser,
    state::AppState,
    utils::extract::JsonBody,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::debug;

/// 关注相关路由，与用户路由挂载在同一前缀下
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:external_uid/follow", post(follow_user))
        .route("/:external_uid/unfollow", post(unfollow_user))
        .route("/:external_uid/followers", get(get_followers))
        .route("/:external_uid/following", get(get_following))
        .route("/:external_uid/stats", get(get_follow_stats))
        .route("/:external_uid/is-following/:target_uid", get(check_following))
}

/// 关注用户
/// POST /api/users/:external_uid/follow
async fn follow_user(
    State(state): State<Arc<AppState>>,
    Path(external_uid): Path<String>,
    JsonBody(request): JsonBody<FollowRequest>,
) -> Result<Json<FollowResponse>> {
    let response = state
        .follow_service
        .follow_user(&external_uid, request.follower_uid())
        .await?;

    Ok(Json(response))
}

/// 取消关注用户
/// POST /api/users/:external_uid/unfollow
async fn unfollow_user(
    State(state): State<Arc<AppState>>,
    Path(external_uid): Path<String>,
    JsonBody(request): JsonBody<FollowRequest>,
) -> Result<Json<FollowResponse>> {
    let response = state
        .follow_service
        .unfollow_user(&external_uid, request.follower_uid())
        .await?;

    Ok(Json(response))
}

/// 获取用户的关注者列表
/// GET /api/users/:external_uid/followers
async fn get_followers(
    State(state): State<Arc<AppState>>,
    Path(external_uid): Path<String>,
) -> Result<Json<Vec<PublicUser>>> {
    let followers = state.follow_service.get_followers(&external_uid).await?;

    Ok(Json(followers))
}

/// 获取用户关注的人列表
/// GET /api/users/:external_uid/following
async fn get_following(
    State(state): State<Arc<AppState>>,
    Path(external_uid): Path<String>,
) -> Result<Json<Vec<PublicUser>>> {
    let following = state.follow_service.get_following(&external_uid).await?;

    Ok(Json(following))
}

/// 获取用户的关注统计
/// GET /api/users/:external_uid/stats
async fn get_follow_stats(
    State(state): State<Arc<AppState>>,
    Path(external_uid): Path<String>,
) -> Result<Json<FollowStats>> {
    let stats = state.follow_service.get_follow_stats(&external_uid).await?;

    Ok(Json(stats))
}

/// 检查是否关注某用户
/// GET /api/users/:external_uid/is-following/:target_uid
async fn check_following(
    State(state): State<Arc<AppState>>,
    Path((external_uid, target_uid)): Path<(String, String)>,
) -> Result<Json<FollowStatus>> {
    debug!("Checking if user {} follows user {}", external_uid, target_uid);

    let is_following = state
        .follow_service
        .is_following(&external_uid, &target_uid)
        .await?;

    Ok(Json(FollowStatus { is_following }))
}
