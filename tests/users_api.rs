use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use surrealdb::sql::Thing;
use tower::ServiceExt;

use rainbow_network::{
    build_router, config::Config, models::follow::plan_edge_deltas, services::Database,
    state::AppState,
};

async fn app_with(config: Config) -> (Arc<AppState>, Router) {
    let db = Arc::new(Database::new(&config).await.unwrap());
    let state = Arc::new(AppState::new(config, db).await.unwrap());
    (state.clone(), build_router(state))
}

async fn app() -> Router {
    app_with(Config::default()).await.1
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_user(app: &Router, uid: &str, name: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/users",
        Some(json!({
            "externalUid": uid,
            "email": format!("{}@example.com", uid),
            "name": name,
            "headline": format!("{} headline", name),
            "bio": format!("About {}", name),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

async fn follow(app: &Router, target: &str, follower: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/api/users/{}/follow", target),
        Some(json!({ "followerUid": follower })),
    )
    .await
}

async fn unfollow(app: &Router, target: &str, follower: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/api/users/{}/unfollow", target),
        Some(json!({ "followerUid": follower })),
    )
    .await
}

fn uids(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|u| u["externalUid"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn follow_scenario_updates_both_lists() {
    let app = app().await;
    create_user(&app, "alice", "Alice").await;
    create_user(&app, "bob", "Bob").await;

    let (status, body) = follow(&app, "bob", "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isFollowing"], true);
    assert_eq!(body["message"], "Successfully followed user");

    let (status, followers) = send(&app, Method::GET, "/api/users/bob/followers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(uids(&followers), vec!["alice"]);

    // 公开投影不暴露私有字段
    let first = followers[0].as_object().unwrap();
    assert_eq!(first["name"], "Alice");
    assert!(!first.contains_key("email"));
    assert!(!first.contains_key("followers"));

    let (_, following) = send(&app, Method::GET, "/api/users/alice/following", None).await;
    assert_eq!(uids(&following), vec!["bob"]);

    let (_, status_body) =
        send(&app, Method::GET, "/api/users/alice/is-following/bob", None).await;
    assert_eq!(status_body, json!({ "isFollowing": true }));

    let (_, reverse) = send(&app, Method::GET, "/api/users/bob/is-following/alice", None).await;
    assert_eq!(reverse, json!({ "isFollowing": false }));
}

#[tokio::test]
async fn follow_rejects_invalid_requests() {
    let app = app().await;
    create_user(&app, "alice", "Alice").await;
    create_user(&app, "bob", "Bob").await;

    let (status, body) = follow(&app, "alice", "alice").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You cannot follow yourself");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/bob/follow",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Follower UID is required");

    let (status, _) = follow(&app, "ghost", "alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = follow(&app, "bob", "ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_follow_is_rejected() {
    let app = app().await;
    create_user(&app, "alice", "Alice").await;
    create_user(&app, "bob", "Bob").await;

    let (status, _) = follow(&app, "bob", "alice").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = follow(&app, "bob", "alice").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Already following this user");
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, followers) = send(&app, Method::GET, "/api/users/bob/followers", None).await;
    assert_eq!(uids(&followers), vec!["alice"]);
}

#[tokio::test]
async fn unfollow_is_idempotent_and_restores_state() {
    let app = app().await;
    create_user(&app, "alice", "Alice").await;
    create_user(&app, "bob", "Bob").await;

    // 未关注时取消关注是静默成功
    let (status, body) = unfollow(&app, "bob", "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isFollowing"], false);

    let (_, alice_before) = send(&app, Method::GET, "/api/users/alice", None).await;
    let (_, bob_before) = send(&app, Method::GET, "/api/users/bob", None).await;

    follow(&app, "bob", "alice").await;
    let (status, body) = unfollow(&app, "bob", "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully unfollowed user");

    let (_, alice_after) = send(&app, Method::GET, "/api/users/alice", None).await;
    let (_, bob_after) = send(&app, Method::GET, "/api/users/bob", None).await;
    assert_eq!(alice_after["following"], alice_before["following"]);
    assert_eq!(alice_after["followers"], alice_before["followers"]);
    assert_eq!(bob_after["following"], bob_before["following"]);
    assert_eq!(bob_after["followers"], bob_before["followers"]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/bob/unfollow",
        Some(json!({ "followerUid": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Follower UID is required");

    let (status, _) = unfollow(&app, "ghost", "alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn connection_lists_and_stats_for_unknown_user() {
    let app = app().await;

    for path in [
        "/api/users/ghost",
        "/api/users/ghost/followers",
        "/api/users/ghost/following",
        "/api/users/ghost/stats",
        "/api/users/ghost/is-following/nobody",
    ] {
        let (status, body) = send(&app, Method::GET, path, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", path);
        assert_eq!(body["message"], "User not found");
    }
}

#[tokio::test]
async fn follow_stats_count_edges() {
    let app = app().await;
    create_user(&app, "alice", "Alice").await;
    create_user(&app, "bob", "Bob").await;
    create_user(&app, "carol", "Carol").await;

    follow(&app, "carol", "alice").await;
    follow(&app, "carol", "bob").await;
    follow(&app, "bob", "carol").await;

    let (status, stats) = send(&app, Method::GET, "/api/users/carol/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats, json!({ "followersCount": 2, "followingCount": 1 }));

    let (_, followers) = send(&app, Method::GET, "/api/users/carol/followers", None).await;
    assert_eq!(uids(&followers), vec!["alice", "bob"]);
}

#[tokio::test]
async fn list_and_get_users() {
    let app = app().await;
    create_user(&app, "alice", "Alice").await;
    create_user(&app, "bob", "Bob").await;

    let (status, body) = send(&app, Method::GET, "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Users fetched successfully");
    assert_eq!(body["count"], 2);
    assert_eq!(body["users"].as_array().unwrap().len(), 2);

    let (status, user) = send(&app, Method::GET, "/api/users/alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["externalUid"], "alice");
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["followers"], json!([]));
    assert_eq!(user["following"], json!([]));
    assert!(user["id"].as_str().unwrap().starts_with("user:"));
}

#[tokio::test]
async fn search_users_by_name() {
    let app = app().await;
    create_user(&app, "alice", "Alice Smith").await;
    create_user(&app, "bob", "Bob Jones").await;

    // 少于两个字符时直接返回空数组
    let (status, body) = send(&app, Method::GET, "/api/users/search?q=%20a%20", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(&app, Method::GET, "/api/users/search", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(&app, Method::GET, "/api/users/search?q=SMI", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(uids(&body), vec!["alice"]);
    assert_eq!(body[0]["bio"], "About Alice Smith");
    assert!(body[0].get("email").is_none());

    let (_, body) = send(&app, Method::GET, "/api/users/search?q=zz", None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn upsert_user_creates_then_updates() {
    let app = app().await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users",
        Some(json!({ "name": "No Uid" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let created = create_user(&app, "alice", "Alice").await;
    assert_eq!(created["name"], "Alice");
    assert_eq!(created["profilePicture"], "");

    // 空 name 不覆盖已有值，其余字段按提供覆盖
    let (status, updated) = send(
        &app,
        Method::POST,
        "/api/users",
        Some(json!({
            "firebaseUid": "alice",
            "name": "",
            "headline": "Staff Engineer",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["name"], "Alice");
    assert_eq!(updated["headline"], "Staff Engineer");
    assert_eq!(updated["bio"], "About Alice");

    let (_, body) = send(&app, Method::GET, "/api/users", None).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn complete_profile_requires_fields() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/complete-profile",
        Some(json!({ "externalUid": "alice", "name": "Alice", "bio": "Hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Required fields: name, headline, and bio");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/complete-profile",
        Some(json!({ "name": "Alice", "headline": "Engineer", "bio": "Hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "External UID is required");

    let (status, user) = send(
        &app,
        Method::POST,
        "/api/users/complete-profile",
        Some(json!({
            "externalUid": "alice",
            "name": "Alice",
            "headline": "Engineer",
            "bio": "Hi",
            "profilePicture": "https://img.example.com/a.png",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["headline"], "Engineer");
    assert_eq!(user["email"], "");

    // 未提供头像时保留原值
    let (status, user) = send(
        &app,
        Method::POST,
        "/api/users/complete-profile",
        Some(json!({
            "externalUid": "alice",
            "name": "Alice A.",
            "headline": "Lead",
            "bio": "Hello",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["name"], "Alice A.");
    assert_eq!(user["profilePicture"], "https://img.example.com/a.png");
}

#[tokio::test]
async fn update_user_only_accepts_allowed_fields() {
    let app = app().await;
    create_user(&app, "alice", "Alice").await;
    create_user(&app, "bob", "Bob").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/users/alice",
        Some(json!({ "name": "Mallory", "followers": ["user:bob"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("followers"));

    let (_, alice) = send(&app, Method::GET, "/api/users/alice", None).await;
    assert_eq!(alice["name"], "Alice");
    assert_eq!(alice["followers"], json!([]));

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/users/alice",
        Some(json!({ "email": "not-an-email" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = send(
        &app,
        Method::PUT,
        "/api/users/alice",
        Some(json!({ "bio": "New bio", "profilePicture": "p.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["bio"], "New bio");
    assert_eq!(updated["profilePicture"], "p.png");
    assert_eq!(updated["name"], "Alice");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/users/ghost",
        Some(json!({ "bio": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_diagnostics() {
    let app = app().await;
    create_user(&app, "alice", "Alice").await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let (status, body) = send(&app, Method::GET, "/api/diagnostics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counts"]["user"], 1);
    assert_eq!(body["pendingEdgeRepairs"], 0);

    let (status, body) = send(&app, Method::POST, "/api/diagnostics/reconcile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "scanned": 1, "repaired": 0 }));
}

#[tokio::test]
async fn search_is_capped_and_ordered_by_name() {
    let app = app().await;
    for idx in (1..=12).rev() {
        create_user(&app, &format!("member{:02}", idx), &format!("Member {:02}", idx)).await;
    }
    create_user(&app, "other", "Someone Else").await;

    let (status, body) = send(&app, Method::GET, "/api/users/search?q=member", None).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<String> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = (1..=10).map(|idx| format!("Member {:02}", idx)).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn rate_limit_ignores_untrusted_forwarded_header() {
    let config = Config {
        rate_limit_requests: 1,
        ..Config::default()
    };
    let (_, app) = app_with(config).await;

    let request = |forwarded: &str| {
        Request::builder()
            .uri("/health")
            .header("x-forwarded-for", forwarded)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(request("203.0.113.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for idx in 2..6 {
        let response = app
            .clone()
            .oneshot(request(&format!("203.0.113.{}", idx)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    }
}

#[derive(Serialize)]
struct DropFollowerParams {
    target: Thing,
}

#[tokio::test]
async fn reconcile_does_not_restore_edge_unfollowed_mid_pass() {
    let (state, app) = app_with(Config::default()).await;
    create_user(&app, "alice", "Alice").await;
    let bob = create_user(&app, "bob", "Bob").await;
    follow(&app, "bob", "alice").await;

    // 只留下 alice 一端的关系
    let bob_id: Thing = bob["id"].as_str().unwrap().parse().unwrap();
    state
        .db
        .query_with_params(
            "UPDATE $target SET followers = []",
            DropFollowerParams { target: bob_id },
        )
        .await
        .unwrap();

    let snapshot = state.follow_service.edge_snapshot().await.unwrap();
    let repairs = plan_edge_deltas(&snapshot);
    assert_eq!(repairs.len(), 1);

    let (status, _) = unfollow(&app, "bob", "alice").await;
    assert_eq!(status, StatusCode::OK);

    for repair in &repairs {
        state.follow_service.apply_edge_repair(repair).await.unwrap();
    }

    let (status, body) = send(&app, Method::POST, "/api/diagnostics/reconcile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["repaired"], 0);

    let (_, followers) = send(&app, Method::GET, "/api/users/bob/followers", None).await;
    assert_eq!(followers, json!([]));
    let (_, following) = send(&app, Method::GET, "/api/users/alice/following", None).await;
    assert_eq!(following, json!([]));
}

#[tokio::test]
async fn self_follow_detected_with_padded_path() {
    let app = app().await;
    create_user(&app, "alice", "Alice").await;

    let (status, body) = follow(&app, "alice%20", "alice").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You cannot follow yourself");
}
