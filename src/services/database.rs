use crate::config::Config;
use crate::error::{AppError, Result};
use serde::Serialize;
use std::sync::Arc;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::{Response, Surreal};
use tracing::{debug, error, info};

/// 用户表结构: 外部身份唯一索引
const SCHEMA: &str = r#"
    DEFINE TABLE user SCHEMALESS;
    DEFINE INDEX user_external_uid ON TABLE user COLUMNS external_uid UNIQUE;
    DEFINE INDEX user_name ON TABLE user COLUMNS name;
"#;

/// 数据库服务
#[derive(Clone)]
pub struct Database {
    client: Arc<Surreal<Any>>,
    pub config: Config,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_url);

        let client = any::connect(config.database_url.as_str()).await?;

        if !config.is_in_memory_database() {
            if let (Some(username), Some(password)) =
                (&config.database_username, &config.database_password)
            {
                client
                    .signin(Root {
                        username: username.as_str(),
                        password: password.as_str(),
                    })
                    .await?;
            }
        }

        client
            .use_ns(config.database_namespace.as_str())
            .use_db(config.database_name.as_str())
            .await?;

        let db = Self {
            client: Arc::new(client),
            config: config.clone(),
        };
        db.migrate().await?;

        Ok(db)
    }

    /// 初始化表和索引
    async fn migrate(&self) -> Result<()> {
        debug!("Applying user schema");
        self.client.query(SCHEMA).await?.check()?;
        Ok(())
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.query("INFO FOR DB").await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// 执行原始SQL查询
    pub async fn query(&self, sql: &str) -> Result<Response> {
        debug!("Executing query: {}", sql.trim());
        let response = self.client.query(sql).await?;
        Ok(response.check()?)
    }

    /// 执行带参数的查询
    ///
    /// 参数按 SurrealDB 的序列化规则绑定，记录 ID (`Thing`) 保持为记录链接，
    /// 因此应传入强类型参数结构体而不是 `serde_json::Value`。
    pub async fn query_with_params<P>(&self, sql: &str, params: P) -> Result<Response>
    where
        P: Serialize,
    {
        debug!("Executing query: {}", sql.trim());
        let response = self.client.query(sql).bind(params).await?;
        Ok(response.check()?)
    }
}
