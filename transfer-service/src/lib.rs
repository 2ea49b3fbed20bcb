//! 数据库导入导出服务
//!
//! 通过 `mysql`、`mysqldump`、`psql`、`pg_dump` 命令行工具提供：
//! - 数据库导出与下载
//! - SQL 文件上传导入
//! - 数据库列表、创建、重命名、删除

pub mod classifier;
pub mod dialect;
pub mod handlers;
pub mod rename;
pub mod routes;
pub mod runner;
pub mod service;
pub mod state;
pub mod views;

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use common::middleware::{no_cache_middleware, request_id_middleware};
use state::AppState;

pub const SERVICE_NAME: &str = "transfer-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "数据库导入导出服务 API",
        version = "0.1.0",
        description = "基于命令行工具的 MySQL / MariaDB / PostgreSQL 导入导出与管理"
    ),
    paths(
        handlers::home,
        handlers::export_page,
        handlers::import_page,
        handlers::manage_page,
        handlers::export_database,
        handlers::download_export,
        handlers::import_database,
        handlers::list_databases,
        handlers::database_operation,
        handlers::health_check,
    ),
    components(schemas(
        common::models::ExportForm,
        common::models::ImportForm,
        common::models::ConnectionForm,
        common::models::DatabaseOperationForm,
        common::models::DatabaseRecord,
        views::PageView,
        views::PageKind,
        handlers::HealthResponse,
        handlers::ToolStatus,
    )),
    tags(
        (name = "pages", description = "表单页面"),
        (name = "transfer", description = "导入导出端点"),
        (name = "manage", description = "数据库管理端点"),
        (name = "health", description = "健康检查端点")
    )
)]
pub struct ApiDoc;

/// 组装路由与中间件
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = usize::try_from(state.config.max_upload_size).unwrap_or(usize::MAX);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(no_cache_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
