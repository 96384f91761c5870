use std::net::SocketAddr;
use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rainbow_network::{
    build_router, config::Config, services::Database, state::AppState,
    utils::middleware::prune_rate_limiter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志（生产环境输出 JSON）
    let filter = tracing_subscriber::EnvFilter::new(&config.log_level);
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Rainbow-Network service...");

    // 初始化数据库连接
    let db = match Database::new(&config).await {
        Ok(db) => {
            db.verify_connection().await?;
            info!("Database connection established successfully");
            Arc::new(db)
        }
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(anyhow::anyhow!("Database initialization failed"));
        }
    };

    // 创建应用状态
    let app_state = Arc::new(AppState::new(config.clone(), db).await?);

    // 启动后台任务
    start_background_tasks(app_state.clone());

    let app = build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Rainbow-Network stopped");
    Ok(())
}

fn start_background_tasks(app_state: Arc<AppState>) {
    // 限流状态清理任务
    if let Some(rate_limiter) = app_state.rate_limiter.clone() {
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(60));

            loop {
                interval.tick().await;
                prune_rate_limiter(&rate_limiter);
            }
        });
    }

    let period = app_state.config.edge_reconcile_interval;
    if period == 0 {
        info!("Follow edge reconciliation disabled");
    } else {
        // 关注关系修复任务
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(period));

            loop {
                interval.tick().await;
                if let Err(e) = app_state.follow_service.reconcile_edges().await {
                    error!("Failed to reconcile follow edges: {}", e);
                }
            }
        });
    }

    info!("Background tasks started successfully");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
