use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use surrealdb::sql::Thing;

use crate::models::user::User;

/// POST /api/users/:external_uid/follow|unfollow 请求体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub follower_uid: Option<String>,
}

impl FollowRequest {
    /// 去掉空白后的关注者外部ID，空字符串视为缺失
    pub fn follower_uid(&self) -> Option<&str> {
        self.follower_uid
            .as_deref()
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub message: String,
    pub is_following: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStatus {
    pub is_following: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStats {
    pub followers_count: usize,
    pub following_count: usize,
}

/// 一次关系修复扫描的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub repaired: usize,
}

/// 单个用户的关系集合
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSets {
    pub id: Thing,
    pub followers: Vec<Thing>,
    pub following: Vec<Thing>,
}

impl From<&User> for EdgeSets {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            followers: user.followers.clone(),
            following: user.following.clone(),
        }
    }
}

/// 计算需要写回的修复后的关系集合，只返回发生变化的用户。
///
/// 规则：
/// - 去掉自关注和指向不存在用户的引用
/// - 去重，保留第一次出现的位置
/// - 只在一端记录的关系在另一端补齐
///
/// 输出满足对称性，且对输出再次规划不会产生任何修复。
pub fn plan_edge_repairs(users: &[EdgeSets]) -> Vec<EdgeSets> {
    let known: HashSet<&Thing> = users.iter().map(|u| &u.id).collect();

    let mut cleaned: Vec<EdgeSets> = users
        .iter()
        .map(|user| EdgeSets {
            id: user.id.clone(),
            followers: clean_refs(&user.id, &user.followers, &known),
            following: clean_refs(&user.id, &user.following, &known),
        })
        .collect();

    let position: HashMap<Thing, usize> = cleaned
        .iter()
        .enumerate()
        .map(|(idx, user)| (user.id.clone(), idx))
        .collect();

    // 先收集缺失的另一端，再统一追加，避免边遍历边修改
    let mut missing_followers: Vec<(usize, Thing)> = Vec::new();
    let mut missing_following: Vec<(usize, Thing)> = Vec::new();

    for user in &cleaned {
        for target in &user.following {
            if let Some(&idx) = position.get(target) {
                if !cleaned[idx].followers.contains(&user.id) {
                    missing_followers.push((idx, user.id.clone()));
                }
            }
        }
        for follower in &user.followers {
            if let Some(&idx) = position.get(follower) {
                if !cleaned[idx].following.contains(&user.id) {
                    missing_following.push((idx, user.id.clone()));
                }
            }
        }
    }

    for (idx, id) in missing_followers {
        if !cleaned[idx].followers.contains(&id) {
            cleaned[idx].followers.push(id);
        }
    }
    for (idx, id) in missing_following {
        if !cleaned[idx].following.contains(&id) {
            cleaned[idx].following.push(id);
        }
    }

    cleaned
        .into_iter()
        .zip(users.iter())
        .filter(|(repaired, original)| repaired != *original)
        .map(|(repaired, _)| repaired)
        .collect()
}

/// 单个用户的增量修复
///
/// 只描述要删除和要补齐的引用，写入时在当前记录上增量应用，不整体覆盖集合。
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRepair {
    pub id: Thing,
    pub drop_followers: Vec<Thing>,
    pub drop_following: Vec<Thing>,
    pub add_followers: Vec<Thing>,
    pub add_following: Vec<Thing>,
}

impl EdgeRepair {
    pub fn between(original: &EdgeSets, repaired: &EdgeSets) -> Self {
        Self {
            id: original.id.clone(),
            drop_followers: difference(&original.followers, &repaired.followers),
            drop_following: difference(&original.following, &repaired.following),
            add_followers: difference(&repaired.followers, &original.followers),
            add_following: difference(&repaired.following, &original.following),
        }
    }
}

/// 与 `plan_edge_repairs` 相同的规划，结果表示为相对快照的增量
pub fn plan_edge_deltas(users: &[EdgeSets]) -> Vec<EdgeRepair> {
    let originals: HashMap<&Thing, &EdgeSets> = users.iter().map(|u| (&u.id, u)).collect();

    plan_edge_repairs(users)
        .iter()
        .filter_map(|repaired| {
            originals
                .get(&repaired.id)
                .map(|original| EdgeRepair::between(original, repaired))
        })
        .collect()
}

fn difference(from: &[Thing], without: &[Thing]) -> Vec<Thing> {
    let mut seen: HashSet<&Thing> = HashSet::new();
    from.iter()
        .filter(|id| !without.contains(id))
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

fn clean_refs(owner: &Thing, refs: &[Thing], known: &HashSet<&Thing>) -> Vec<Thing> {
    let mut seen: HashSet<&Thing> = HashSet::new();
    refs.iter()
        .filter(|id| *id != owner && known.contains(id))
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}
