use crate::{
    error::{AppError, Result},
    models::follow::*,
    models::user::{PublicUser, User},
    services::{Database, UserService},
    utils::validation::require_external_uid,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use surrealdb::sql::Thing;
use tracing::{debug, info, warn};

/// 关注与取消关注在同一个事务中修改两端记录
const FOLLOW_QUERY: &str = r#"
    BEGIN TRANSACTION;
    UPDATE $actor SET following = array::union(following, [$target]), updated_at = $now;
    UPDATE $target SET followers = array::union(followers, [$actor]), updated_at = $now;
    COMMIT TRANSACTION;
"#;

const UNFOLLOW_QUERY: &str = r#"
    BEGIN TRANSACTION;
    UPDATE $actor SET following = array::complement(following, [$target]), updated_at = $now;
    UPDATE $target SET followers = array::complement(followers, [$actor]), updated_at = $now;
    COMMIT TRANSACTION;
"#;

/// 增量修复：删除无效引用后，只补齐对方记录当前仍然存在的关系。
/// 快照之后发生的关注或取消关注不会被覆盖。
const REPAIR_QUERY: &str = r#"
    UPDATE $user SET
        followers = array::union(
            array::complement(array::distinct(followers), $drop_followers),
            (SELECT VALUE id FROM $add_followers WHERE following CONTAINS $user)
        ),
        following = array::union(
            array::complement(array::distinct(following), $drop_following),
            (SELECT VALUE id FROM $add_following WHERE followers CONTAINS $user)
        ),
        updated_at = $now;
"#;

#[derive(Serialize)]
struct EdgeParams {
    actor: Thing,
    target: Thing,
    now: DateTime<Utc>,
}

#[derive(Serialize)]
struct RepairParams<'a> {
    user: &'a Thing,
    drop_followers: &'a [Thing],
    drop_following: &'a [Thing],
    add_followers: &'a [Thing],
    add_following: &'a [Thing],
    now: DateTime<Utc>,
}

#[derive(Clone)]
pub struct FollowService {
    db: Arc<Database>,
    user_service: UserService,
}

impl FollowService {
    pub async fn new(db: Arc<Database>, user_service: UserService) -> Result<Self> {
        Ok(Self { db, user_service })
    }

    /// actor 关注 target
    pub async fn follow_user(
        &self,
        target_uid: &str,
        actor_uid: Option<&str>,
    ) -> Result<FollowResponse> {
        let actor_uid = actor_uid.ok_or_else(|| AppError::bad_request("Follower UID is required"))?;
        let target_uid = require_external_uid(Some(target_uid))?;
        debug!("User {} following user {}", actor_uid, target_uid);

        // 防止自己关注自己
        if actor_uid == target_uid {
            return Err(AppError::bad_request("You cannot follow yourself"));
        }

        let (actor, target) = self.load_pair(actor_uid, target_uid).await?;

        // 重复关注视为冲突，而不是静默成功
        if actor.is_following(&target.id) {
            return Err(AppError::conflict("Already following this user"));
        }

        self.db
            .query_with_params(
                FOLLOW_QUERY,
                EdgeParams {
                    actor: actor.id.clone(),
                    target: target.id.clone(),
                    now: Utc::now(),
                },
            )
            .await?;

        info!("User {} followed user {}", actor_uid, target_uid);
        Ok(FollowResponse {
            message: "Successfully followed user".to_string(),
            is_following: true,
        })
    }

    /// actor 取消关注 target，关系不存在时也返回成功
    pub async fn unfollow_user(
        &self,
        target_uid: &str,
        actor_uid: Option<&str>,
    ) -> Result<FollowResponse> {
        let actor_uid = actor_uid.ok_or_else(|| AppError::bad_request("Follower UID is required"))?;
        let target_uid = require_external_uid(Some(target_uid))?;
        debug!("User {} unfollowing user {}", actor_uid, target_uid);

        let (actor, target) = self.load_pair(actor_uid, target_uid).await?;

        if !actor.is_following(&target.id) && !target.followers.contains(&actor.id) {
            debug!("User {} does not follow user {}, nothing to remove", actor_uid, target_uid);
        } else {
            self.db
                .query_with_params(
                    UNFOLLOW_QUERY,
                    EdgeParams {
                        actor: actor.id.clone(),
                        target: target.id.clone(),
                        now: Utc::now(),
                    },
                )
                .await?;
            info!("User {} unfollowed user {}", actor_uid, target_uid);
        }

        Ok(FollowResponse {
            message: "Successfully unfollowed user".to_string(),
            is_following: false,
        })
    }

    /// 获取关注者列表（公开资料，按关注顺序）
    pub async fn get_followers(&self, external_uid: &str) -> Result<Vec<PublicUser>> {
        debug!("Getting followers for user: {}", external_uid);

        let user = self.user_service.get_by_external_uid(external_uid).await?;
        let followers = self.user_service.find_by_ids(&user.followers).await?;
        Ok(followers.iter().map(User::to_public).collect())
    }

    /// 获取关注的人列表（公开资料，按关注顺序）
    pub async fn get_following(&self, external_uid: &str) -> Result<Vec<PublicUser>> {
        debug!("Getting following for user: {}", external_uid);

        let user = self.user_service.get_by_external_uid(external_uid).await?;
        let following = self.user_service.find_by_ids(&user.following).await?;
        Ok(following.iter().map(User::to_public).collect())
    }

    pub async fn is_following(&self, actor_uid: &str, target_uid: &str) -> Result<bool> {
        let (actor, target) = self.load_pair(actor_uid, target_uid).await?;
        Ok(actor.is_following(&target.id))
    }

    pub async fn get_follow_stats(&self, external_uid: &str) -> Result<FollowStats> {
        debug!("Getting follow stats for user: {}", external_uid);

        let user = self.user_service.get_by_external_uid(external_uid).await?;
        Ok(FollowStats {
            followers_count: user.followers.len(),
            following_count: user.following.len(),
        })
    }

    /// 扫描全部用户并修复关注关系集合
    ///
    /// 幂等：对已一致的数据不写入任何内容。
    pub async fn reconcile_edges(&self) -> Result<ReconcileReport> {
        let snapshot = self.edge_snapshot().await?;
        let repairs = plan_edge_deltas(&snapshot);

        let report = ReconcileReport {
            scanned: snapshot.len(),
            repaired: repairs.len(),
        };

        for repair in &repairs {
            self.apply_edge_repair(repair).await?;
        }

        if report.repaired > 0 {
            info!(
                "Follow edge reconciliation repaired {} of {} users",
                report.repaired, report.scanned
            );
        } else {
            debug!("Follow edge reconciliation found {} consistent users", report.scanned);
        }

        Ok(report)
    }

    /// 读取所有用户当前的关系集合
    pub async fn edge_snapshot(&self) -> Result<Vec<EdgeSets>> {
        let users = self.user_service.list_users().await?;
        Ok(users.iter().map(EdgeSets::from).collect())
    }

    /// 在记录当前状态上应用一次增量修复
    pub async fn apply_edge_repair(&self, repair: &EdgeRepair) -> Result<()> {
        warn!(
            "Repairing follow edges for {}: -{} +{} followers, -{} +{} following",
            repair.id,
            repair.drop_followers.len(),
            repair.add_followers.len(),
            repair.drop_following.len(),
            repair.add_following.len()
        );

        self.db
            .query_with_params(
                REPAIR_QUERY,
                RepairParams {
                    user: &repair.id,
                    drop_followers: &repair.drop_followers,
                    drop_following: &repair.drop_following,
                    add_followers: &repair.add_followers,
                    add_following: &repair.add_following,
                    now: Utc::now(),
                },
            )
            .await?;

        Ok(())
    }

    /// 需要修复的用户数量（只读）
    pub async fn pending_edge_repairs(&self) -> Result<usize> {
        let snapshot = self.edge_snapshot().await?;
        Ok(plan_edge_repairs(&snapshot).len())
    }

    async fn load_pair(&self, actor_uid: &str, target_uid: &str) -> Result<(User, User)> {
        let actor = self.user_service.find_by_external_uid(actor_uid).await?;
        let target = self.user_service.find_by_external_uid(target_uid).await?;

        match (actor, target) {
            (Some(actor), Some(target)) => Ok((actor, target)),
            _ => Err(AppError::not_found("User")),
        }
    }
}
