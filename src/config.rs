use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Database configuration
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: Option<String>,
    pub database_password: Option<String>,

    // Rate limiting
    pub rate_limit_requests: u32,
    /// 仅在反向代理之后开启，否则 X-Forwarded-For 由客户端任意填写
    pub trust_proxy_headers: bool,

    // Search configuration
    pub search_min_length: usize,
    pub search_max_results: usize,

    // Follow graph maintenance (秒, 0 表示关闭)
    pub edge_reconcile_interval: u64,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "rainbow_network=debug,tower_http=debug".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "rainbow".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "network".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            database_password: env::var("DATABASE_PASSWORD")
                .ok()
                .filter(|value| !value.trim().is_empty()),

            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            trust_proxy_headers: env::var("TRUST_PROXY_HEADERS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,

            search_min_length: env::var("SEARCH_MIN_LENGTH")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            search_max_results: env::var("SEARCH_MAX_RESULTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            edge_reconcile_interval: env::var("EDGE_RECONCILE_INTERVAL")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 内存数据库无需认证
    pub fn is_in_memory_database(&self) -> bool {
        self.database_url.starts_with("mem://")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 5000,
            environment: "test".to_string(),
            log_level: "rainbow_network=debug".to_string(),
            database_url: "mem://".to_string(),
            database_namespace: "rainbow".to_string(),
            database_name: "network".to_string(),
            database_username: None,
            database_password: None,
            rate_limit_requests: 100,
            trust_proxy_headers: false,
            search_min_length: 2,
            search_max_results: 10,
            edge_reconcile_interval: 0,
            cors_allowed_origins: "http://localhost:3000".to_string(),
        }
    }
}
