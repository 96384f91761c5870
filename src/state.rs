use crate::{
    config::Config,
    error::Result,
    services::{database::Database, follow::FollowService, user::UserService},
    utils::middleware::{build_rate_limiter, KeyedRateLimiter},
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 用户服务
    pub user_service: UserService,

    /// 关注服务
    pub follow_service: FollowService,

    /// 按 IP 限流，未配置时为 None
    pub rate_limiter: Option<Arc<KeyedRateLimiter>>,
}

impl AppState {
    /// 基于已建立的数据库连接初始化所有服务
    pub async fn new(config: Config, db: Arc<Database>) -> Result<Self> {
        let user_service = UserService::new(db.clone()).await?;
        let follow_service = FollowService::new(db.clone(), user_service.clone()).await?;
        let rate_limiter = build_rate_limiter(config.rate_limit_requests);

        Ok(Self {
            config,
            db,
            user_service,
            follow_service,
            rate_limiter,
        })
    }
}
