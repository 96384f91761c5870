use crate::{
    error::{AppError, Result},
    state::AppState,
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(diagnostics))
        .route("/reconcile", post(reconcile_edges))
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: usize,
}

/// 诊断端点（生产环境不可用）
/// GET /api/diagnostics
async fn diagnostics(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    ensure_not_production(&state)?;

    debug!("Running diagnostics endpoint");

    let mut response = state
        .db
        .query("SELECT count() AS total FROM user GROUP ALL")
        .await?;
    let users = response
        .take::<Option<CountRow>>(0)?
        .map(|row| row.total)
        .unwrap_or(0);

    let pending_edge_repairs = state.follow_service.pending_edge_repairs().await?;

    Ok(Json(json!({
        "environment": state.config.environment,
        "database": {
            "namespace": state.config.database_namespace,
            "name": state.config.database_name,
            "url": state.config.database_url,
        },
        "counts": {
            "user": users,
        },
        "pendingEdgeRepairs": pending_edge_repairs,
    })))
}

/// 立即执行一次关注关系修复
/// POST /api/diagnostics/reconcile
async fn reconcile_edges(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    ensure_not_production(&state)?;

    let report = state.follow_service.reconcile_edges().await?;
    info!("Manual reconciliation finished: {:?}", report);

    Ok(Json(json!(report)))
}

fn ensure_not_production(state: &AppState) -> Result<()> {
    if state.config.is_production() {
        return Err(AppError::not_found("Diagnostics endpoint"));
    }
    Ok(())
}
