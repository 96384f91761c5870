use crate::{
    error::{AppError, Result},
    models::user::*,
    services::Database,
    utils::validation::{require_external_uid, validate_required_profile_fields},
};
use serde::Serialize;
use std::sync::Arc;
use surrealdb::sql::Thing;
use tracing::{debug, info, warn};
use validator::Validate;

#[derive(Serialize)]
struct ExternalUidParams<'a> {
    external_uid: &'a str,
}

#[derive(Serialize)]
struct IdsParams<'a> {
    ids: &'a [Thing],
}

#[derive(Serialize)]
struct SearchParams {
    term: String,
    limit: usize,
}

#[derive(Serialize)]
struct CreateParams {
    data: NewUser,
}

#[derive(Serialize)]
struct MergeParams {
    id: Thing,
    changes: ProfileChanges,
}

/// 用户服务，处理用户资料相关的业务逻辑
#[derive(Clone)]
pub struct UserService {
    db: Arc<Database>,
    search_min_length: usize,
    search_max_results: usize,
}

impl UserService {
    /// 创建新的用户服务实例
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        let search_min_length = db.config.search_min_length;
        let search_max_results = db.config.search_max_results;
        Ok(Self {
            db,
            search_min_length,
            search_max_results,
        })
    }

    /// 获取全部用户，按创建时间排序
    pub async fn list_users(&self) -> Result<Vec<User>> {
        debug!("Fetching all users");

        let mut response = self
            .db
            .query("SELECT * FROM user ORDER BY created_at ASC")
            .await?;
        let users: Vec<User> = response.take(0)?;
        Ok(users)
    }

    /// 按姓名搜索用户（不区分大小写的子串匹配）
    ///
    /// 去除空白后长度不足最小值时直接返回空列表，不访问数据库。
    pub async fn search_users(&self, query: &str) -> Result<Vec<PublicUser>> {
        let term = query.trim();
        if term.chars().count() < self.search_min_length {
            debug!("Search query too short, skipping: {:?}", term);
            return Ok(Vec::new());
        }

        debug!("Searching users with query: {}", term);

        let mut response = self
            .db
            .query_with_params(
                r#"
                    SELECT * FROM user
                    WHERE string::lowercase(name) CONTAINS $term
                    ORDER BY name ASC
                    LIMIT $limit
                "#,
                SearchParams {
                    term: term.to_lowercase(),
                    limit: self.search_max_results,
                },
            )
            .await?;
        let users: Vec<User> = response.take(0)?;

        Ok(users.iter().map(User::to_search_result).collect())
    }

    /// 通过外部身份ID查找用户
    pub async fn find_by_external_uid(&self, external_uid: &str) -> Result<Option<User>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM user WHERE external_uid = $external_uid LIMIT 1",
                ExternalUidParams { external_uid },
            )
            .await?;
        let users: Vec<User> = response.take(0)?;
        Ok(users.into_iter().next())
    }

    /// 通过外部身份ID获取用户，不存在时返回 NotFound
    pub async fn get_by_external_uid(&self, external_uid: &str) -> Result<User> {
        self.find_by_external_uid(external_uid)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// 按给定顺序批量加载用户，跳过已不存在的记录
    pub async fn find_by_ids(&self, ids: &[Thing]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut response = self
            .db
            .query_with_params("SELECT * FROM user WHERE id INSIDE $ids", IdsParams { ids })
            .await?;
        let users: Vec<User> = response.take(0)?;

        Ok(order_by_ids(ids, users))
    }

    /// 创建或更新用户资料 (POST /api/users)
    ///
    /// 已存在的用户：`name` 仅在非空时覆盖，其余资料字段在提供时覆盖。
    pub async fn upsert_user(&self, request: UpsertUserRequest) -> Result<User> {
        let external_uid = require_external_uid(request.external_uid.as_deref())?;

        match self.find_by_external_uid(external_uid).await? {
            Some(existing) => {
                debug!("Updating existing user: {}", external_uid);

                let mut changes = ProfileChanges::new();
                changes.name = request.name.filter(|name| !name.is_empty());
                changes.bio = request.bio;
                changes.headline = request.headline;
                changes.profile_picture = request.profile_picture;

                self.merge_changes(&existing, changes).await
            }
            None => {
                let mut new_user = NewUser::new(external_uid.to_string());
                new_user.email = request.email.unwrap_or_default();
                new_user.name = request.name.unwrap_or_default();
                new_user.bio = request.bio.unwrap_or_default();
                new_user.headline = request.headline.unwrap_or_default();
                new_user.profile_picture = request.profile_picture.unwrap_or_default();

                self.create_user(new_user).await
            }
        }
    }

    /// 完善资料 (POST /api/users/complete-profile)
    pub async fn complete_profile(&self, request: CompleteProfileRequest) -> Result<User> {
        debug!("Complete profile request for: {:?}", request.external_uid);

        let external_uid = require_external_uid(request.external_uid.as_deref())?;
        let (name, headline, bio) = validate_required_profile_fields(
            request.name.as_deref(),
            request.headline.as_deref(),
            request.bio.as_deref(),
        )?;

        match self.find_by_external_uid(external_uid).await? {
            Some(existing) => {
                let mut changes = ProfileChanges::new();
                changes.name = Some(name.to_string());
                changes.headline = Some(headline.to_string());
                changes.bio = Some(bio.to_string());
                changes.profile_picture = request.profile_picture.filter(|p| !p.is_empty());

                self.merge_changes(&existing, changes).await
            }
            None => {
                let mut new_user = NewUser::new(external_uid.to_string());
                new_user.email = request.email.unwrap_or_default();
                new_user.name = name.to_string();
                new_user.headline = headline.to_string();
                new_user.bio = bio.to_string();
                new_user.profile_picture = request.profile_picture.unwrap_or_default();

                self.create_user(new_user).await
            }
        }
    }

    /// 按白名单字段更新用户资料 (PUT /api/users/:external_uid)
    pub async fn update_user(&self, external_uid: &str, request: UpdateUserRequest) -> Result<User> {
        debug!("Updating user profile: {}", external_uid);

        request.validate()?;

        let existing = self.get_by_external_uid(external_uid).await?;
        let changes = ProfileChanges::from(request);
        if changes.is_empty() {
            return Ok(existing);
        }

        let updated = self.merge_changes(&existing, changes).await?;
        info!("Updated user profile: {}", external_uid);
        Ok(updated)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let external_uid = new_user.external_uid.clone();

        let mut response = match self
            .db
            .query_with_params("CREATE user CONTENT $data", CreateParams { data: new_user })
            .await
        {
            Ok(response) => response,
            Err(AppError::Database(e)) => {
                // 并发创建时唯一索引拒绝了后到的写入
                if self.find_by_external_uid(&external_uid).await?.is_some() {
                    warn!("User {} was created concurrently: {}", external_uid, e);
                    return Err(AppError::conflict("User with this external UID already exists"));
                }
                return Err(AppError::Database(e));
            }
            Err(e) => return Err(e),
        };
        let created: Vec<User> = response.take(0)?;

        let user = created
            .into_iter()
            .next()
            .ok_or_else(|| AppError::internal("Failed to create user"))?;

        info!("Created user {} ({})", external_uid, user.id);
        Ok(user)
    }

    async fn merge_changes(&self, existing: &User, changes: ProfileChanges) -> Result<User> {
        let mut response = self
            .db
            .query_with_params(
                "UPDATE $id MERGE $changes RETURN AFTER",
                MergeParams {
                    id: existing.id.clone(),
                    changes,
                },
            )
            .await?;
        let updated: Vec<User> = response.take(0)?;

        updated
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("User"))
    }
}

/// 按 ID 列表的顺序重排查询结果
fn order_by_ids(ids: &[Thing], users: Vec<User>) -> Vec<User> {
    let mut by_id: std::collections::HashMap<Thing, User> =
        users.into_iter().map(|user| (user.id.clone(), user)).collect();

    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}
