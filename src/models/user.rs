use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;
use validator::Validate;

/// 用户记录（`user` 表）
///
/// `followers` / `following` 是关注关系在两端的冗余记录，
/// 只能由关注服务修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Thing,
    pub external_uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default)]
    pub followers: Vec<Thing>,
    #[serde(default)]
    pub following: Vec<Thing>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新建用户时写入的内容，ID 由数据库分配
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub external_uid: String,
    pub email: String,
    pub name: String,
    pub bio: String,
    pub headline: String,
    pub profile_picture: String,
    pub followers: Vec<Thing>,
    pub following: Vec<Thing>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewUser {
    pub fn new(external_uid: String) -> Self {
        let now = Utc::now();
        Self {
            external_uid,
            email: String::new(),
            name: String::new(),
            bio: String::new(),
            headline: String::new(),
            profile_picture: String::new(),
            followers: Vec::new(),
            following: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 资料字段的部分更新（MERGE），`None` 的字段不会写入
#[derive(Debug, Clone, Serialize)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileChanges {
    pub fn new() -> Self {
        Self {
            email: None,
            name: None,
            bio: None,
            headline: None,
            profile_picture: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.name.is_none()
            && self.bio.is_none()
            && self.headline.is_none()
            && self.profile_picture.is_none()
    }
}

/// POST /api/users 请求体（创建或更新）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    #[serde(alias = "firebaseUid")]
    pub external_uid: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub headline: Option<String>,
    pub profile_picture: Option<String>,
}

/// POST /api/users/complete-profile 请求体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteProfileRequest {
    #[serde(alias = "firebaseUid")]
    pub external_uid: Option<String>,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub email: Option<String>,
}

/// PUT /api/users/:external_uid 请求体
///
/// 只允许修改列出的资料字段，未知字段直接拒绝。
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    pub bio: Option<String>,

    #[validate(length(max = 220, message = "Headline must be at most 220 characters"))]
    pub headline: Option<String>,

    #[validate(length(max = 2048, message = "Profile picture URL is too long"))]
    pub profile_picture: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

impl From<UpdateUserRequest> for ProfileChanges {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            email: req.email,
            name: req.name,
            bio: req.bio,
            headline: req.headline,
            profile_picture: req.profile_picture,
            updated_at: Utc::now(),
        }
    }
}

/// 完整用户文档（对外 JSON）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub external_uid: String,
    pub email: String,
    pub name: String,
    pub bio: String,
    pub headline: String,
    pub profile_picture: String,
    pub followers: Vec<String>,
    pub following: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 公开资料投影，不包含邮箱和关系列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub external_uid: String,
    pub name: String,
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub profile_picture: String,
}

impl User {
    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id.to_string(),
            external_uid: self.external_uid.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            bio: self.bio.clone(),
            headline: self.headline.clone(),
            profile_picture: self.profile_picture.clone(),
            followers: self.followers.iter().map(|id| id.to_string()).collect(),
            following: self.following.iter().map(|id| id.to_string()).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// 关系列表使用的公开投影
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            external_uid: self.external_uid.clone(),
            name: self.name.clone(),
            headline: self.headline.clone(),
            bio: None,
            profile_picture: self.profile_picture.clone(),
        }
    }

    /// 搜索结果使用的公开投影（附带简介）
    pub fn to_search_result(&self) -> PublicUser {
        PublicUser {
            bio: Some(self.bio.clone()),
            ..self.to_public()
        }
    }

    pub fn is_following(&self, target: &Thing) -> bool {
        self.following.contains(target)
    }
}
