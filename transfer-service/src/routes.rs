//! 路由模块

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// 创建页面与 API 路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::home))
        .route(
            "/db/export",
            get(handlers::export_page).post(handlers::export_database),
        )
        .route("/db/download", get(handlers::download_export))
        .route(
            "/db/import",
            get(handlers::import_page).post(handlers::import_database),
        )
        .route("/db/manage", get(handlers::manage_page))
        .route("/db/manage/list", post(handlers::list_databases))
        .route("/db/manage/operation", post(handlers::database_operation))
        .route("/api/health", get(handlers::health_check))
}
