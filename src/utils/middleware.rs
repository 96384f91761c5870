use crate::{error::AppError, state::AppState};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};
use tracing::{debug, info, warn};

pub type KeyedRateLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// 按每分钟请求数创建按 IP 计数的限流器，0 表示不限流
pub fn build_rate_limiter(requests_per_minute: u32) -> Option<Arc<KeyedRateLimiter>> {
    NonZeroU32::new(requests_per_minute)
        .map(|limit| Arc::new(RateLimiter::dashmap(Quota::per_minute(limit))))
}

/// 清理已恢复到初始状态的限流键并回收空间
pub fn prune_rate_limiter(rate_limiter: &KeyedRateLimiter) {
    rate_limiter.retain_recent();
    rate_limiter.shrink_to_fit();
    debug!("Rate limiter pruned, {} active keys", rate_limiter.len());
}

/// 速率限制中间件
pub async fn rate_limit_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let Some(rate_limiter) = app_state.rate_limiter.as_ref() else {
        return Ok(next.run(request).await);
    };

    let client_ip = get_client_ip(&request, app_state.config.trust_proxy_headers);

    match rate_limiter.check_key(&client_ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            warn!("Rate limit exceeded for IP: {}", client_ip);
            Err(AppError::RateLimitExceeded)
        }
    }
}

/// 请求日志中间件
pub async fn request_logging_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request, app_state.config.trust_proxy_headers);
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let start_time = std::time::Instant::now();

    debug!(
        "Incoming request [{}]: {} {} from {}",
        request_id, method, uri, client_ip
    );

    let response = next.run(request).await;

    info!(
        "Request completed [{}]: {} {} {} - {}ms",
        request_id,
        method,
        uri,
        response.status().as_u16(),
        start_time.elapsed().as_millis()
    );

    response
}

/// 请求 ID 中间件
pub async fn request_id_middleware(mut request: Request<Body>, next: Next<Body>) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// 获取客户端 IP 地址
///
/// 转发头只在 `trust_forwarded` 时使用，否则取连接的对端地址。
fn get_client_ip(request: &Request<Body>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let headers = request.headers();

        if let Some(forwarded_for) = headers.get("x-forwarded-for") {
            if let Ok(ip_str) = forwarded_for.to_str() {
                if let Some(ip) = ip_str.split(',').next() {
                    return ip.trim().to_string();
                }
            }
        }

        if let Some(real_ip) = headers.get("x-real-ip") {
            if let Ok(ip_str) = real_ip.to_str() {
                return ip_str.to_string();
            }
        }
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 请求 ID 包装器
#[derive(Debug, Clone)]
pub struct RequestId(pub String);
