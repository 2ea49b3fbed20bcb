//! Handler模块

use std::any::Any;

use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::FormRejection,
        Multipart, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use utoipa::{IntoParams, ToSchema};

use common::errors::{AppError, AppResult};
use common::models::{ConnectionForm, DatabaseOperationForm, ExportForm, ImportForm};
use common::response::ApiResponse;

use crate::runner::find_on_path;
use crate::service::{ExportArtifact, TransferService, UploadArtifact};
use crate::state::AppState;
use crate::views::{PageKind, PageView, ResponseFormat};
use crate::SERVICE_NAME;

/// 依赖的命令行工具
const TOOLS: [&str; 4] = ["mysql", "mysqldump", "psql", "pg_dump"];

/// 渲染成功页面
async fn page(state: &AppState, headers: &HeaderMap, view: PageView) -> Response {
    state
        .views
        .respond(ResponseFormat::from_headers(headers), StatusCode::OK, view)
        .await
}

/// 在原表单页面上渲染错误，状态码取自错误类型
async fn failure(
    state: &AppState,
    headers: &HeaderMap,
    view: PageView,
    err: &AppError,
    message: String,
) -> Response {
    tracing::warn!(code = err.code(), page = ?view.page, error = %err, "request failed");
    let view = view.with_failure(err, message);
    state
        .views
        .respond(ResponseFormat::from_headers(headers), err.status_code(), view)
        .await
}

fn invalid_form(detail: String) -> AppError {
    AppError::validation(format!("Invalid form data: {}", detail), &[])
}

/// 首页
#[utoipa::path(
    get,
    path = "/",
    tag = "pages",
    responses((status = 200, description = "首页", body = ApiResponse<PageView>))
)]
pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page(&state, &headers, PageView::new(PageKind::Home)).await
}

/// 导出表单页面
#[utoipa::path(
    get,
    path = "/db/export",
    tag = "pages",
    responses((status = 200, description = "导出表单", body = ApiResponse<PageView>))
)]
pub async fn export_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page(&state, &headers, PageView::new(PageKind::Export)).await
}

/// 导入表单页面
#[utoipa::path(
    get,
    path = "/db/import",
    tag = "pages",
    responses((status = 200, description = "导入表单", body = ApiResponse<PageView>))
)]
pub async fn import_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page(&state, &headers, PageView::new(PageKind::Import)).await
}

/// 数据库管理页面
#[utoipa::path(
    get,
    path = "/db/manage",
    tag = "pages",
    responses((status = 200, description = "管理页面", body = ApiResponse<PageView>))
)]
pub async fn manage_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page(&state, &headers, PageView::new(PageKind::Manage)).await
}

/// 导出参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    /// 为 `true` 时直接下载导出文件
    pub download: Option<String>,
}

/// 导出数据库
#[utoipa::path(
    post,
    path = "/db/export",
    tag = "transfer",
    params(ExportQuery),
    request_body(content = ExportForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "导出成功，返回下载链接或文件", body = ApiResponse<PageView>),
        (status = 400, description = "表单校验失败"),
        (status = 500, description = "导出命令失败")
    )
)]
pub async fn export_database(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ExportQuery>,
    form: Result<Form<ExportForm>, FormRejection>,
) -> Response {
    let view = PageView::new(PageKind::Export);
    let mut form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            let err = invalid_form(rejection.body_text());
            return failure(&state, &headers, view, &err, err.to_string()).await;
        }
    };

    let request = match form.resolve() {
        Ok(request) => request,
        Err(err) => {
            let view = view.with_export(form);
            return failure(&state, &headers, view, &err, err.to_string()).await;
        }
    };

    let artifact = match state.service.export(&request).await {
        Ok(artifact) => artifact,
        Err(err) => {
            let message = state.service.describe_failure("export database", &err);
            return failure(&state, &headers, view.with_export(form), &err, message).await;
        }
    };

    if query.download.as_deref() == Some("true") {
        return match attachment(&artifact).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        };
    }

    let view = view
        .with_success(format!(
            "Database exported successfully to {}",
            artifact.path.display()
        ))
        .with_download(&artifact.file_name)
        .with_export(form);
    page(&state, &headers, view).await
}

/// 下载参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// 导出文件名，仅取最后一段路径
    pub file: Option<String>,
}

/// 下载导出文件
#[utoipa::path(
    get,
    path = "/db/download",
    tag = "transfer",
    params(DownloadQuery),
    responses(
        (status = 200, description = "SQL 文件", content_type = "application/sql"),
        (status = 400, description = "未指定文件"),
        (status = 404, description = "文件不存在")
    )
)]
pub async fn download_export(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let artifact = state.service.resolve_download(query.file.as_deref()).await?;
    attachment(&artifact).await
}

/// 以附件形式流式返回导出文件
async fn attachment(artifact: &ExportArtifact) -> AppResult<Response> {
    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(|e| AppError::file_io("Failed to open export file", e))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| AppError::file_io("Failed to read export file", e))?
        .len();

    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/sql"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// 已接收的导入请求
#[derive(Default)]
struct ImportSubmission {
    form: ImportForm,
    upload: Option<UploadArtifact>,
    original_name: String,
}

/// 读取 multipart 字段；`sqlFile` 直接流式写入上传目录
async fn receive_import(
    service: &TransferService,
    multipart: &mut Multipart,
    submission: &mut ImportSubmission,
) -> AppResult<()> {
    let multipart_error = |e: MultipartError| invalid_form(e.body_text());

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name != "sqlFile" {
            let value = field.text().await.map_err(multipart_error)?;
            submission.form.set_field(&name, value);
            continue;
        }

        let original = field.file_name().unwrap_or_default().to_string();
        if original.is_empty() || submission.upload.is_some() {
            // 未选择文件或重复字段
            while field.chunk().await.map_err(multipart_error)?.is_some() {}
            continue;
        }

        let (upload, mut file) = service.create_upload(&original).await?;
        submission.upload = Some(upload);
        submission.original_name = original;

        let mut size = 0usize;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            size += chunk.len();
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::file_io("Failed to save uploaded file", e))?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::file_io("Failed to save uploaded file", e))?;
        tracing::info!(file = %submission.original_name, size, "upload received");
    }
    Ok(())
}

/// 导入数据库
#[utoipa::path(
    post,
    path = "/db/import",
    tag = "transfer",
    request_body(content = ImportForm, content_type = "multipart/form-data", description = "表单字段外加 `sqlFile` 文件"),
    responses(
        (status = 200, description = "导入成功", body = ApiResponse<PageView>),
        (status = 400, description = "表单校验失败"),
        (status = 500, description = "导入命令失败")
    )
)]
pub async fn import_database(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let view = PageView::new(PageKind::Import);
    let mut submission = ImportSubmission::default();

    let received = match multipart {
        Ok(mut multipart) => receive_import(&state.service, &mut multipart, &mut submission).await,
        Err(rejection) => Err(invalid_form(rejection.body_text())),
    };

    let ImportSubmission {
        mut form,
        upload,
        original_name,
    } = submission;

    if let Err(err) = received {
        if let Some(upload) = &upload {
            state.service.discard_upload(upload).await;
        }
        return failure(&state, &headers, view.with_import(form), &err, err.to_string()).await;
    }

    let Some(upload) = upload else {
        let err = AppError::validation("Please upload a SQL file", &["sqlFile"]);
        return failure(&state, &headers, view.with_import(form), &err, err.to_string()).await;
    };

    let request = match form.resolve(upload.path.clone()) {
        Ok(request) => request,
        Err(err) => {
            state.service.discard_upload(&upload).await;
            return failure(&state, &headers, view.with_import(form), &err, err.to_string()).await;
        }
    };

    if let Err(err) = state.service.import(&request).await {
        let message = state.service.describe_failure("import database", &err);
        return failure(&state, &headers, view.with_import(form), &err, message).await;
    }

    let view = view
        .with_success(format!("Database imported successfully from {}", original_name))
        .with_import(form);
    page(&state, &headers, view).await
}

/// 列出数据库
#[utoipa::path(
    post,
    path = "/db/manage/list",
    tag = "manage",
    request_body(content = ConnectionForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "数据库列表", body = ApiResponse<PageView>),
        (status = 400, description = "表单校验失败"),
        (status = 500, description = "列出数据库失败")
    )
)]
pub async fn list_databases(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<ConnectionForm>, FormRejection>,
) -> Response {
    let view = PageView::new(PageKind::Manage);
    let mut form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            let err = invalid_form(rejection.body_text());
            return failure(&state, &headers, view, &err, err.to_string()).await;
        }
    };

    let connection = match form.resolve() {
        Ok(connection) => connection,
        Err(err) => {
            return failure(&state, &headers, view.with_connection(form), &err, err.to_string())
                .await;
        }
    };

    match state.service.list_databases(&connection).await {
        Ok(databases) => {
            let view = view
                .with_success("Databases listed successfully")
                .with_connection(form)
                .with_databases(Some(databases));
            page(&state, &headers, view).await
        }
        Err(err) => {
            let message = state.service.describe_failure("list databases", &err);
            failure(&state, &headers, view.with_connection(form), &err, message).await
        }
    }
}

/// 创建 / 重命名 / 删除数据库
#[utoipa::path(
    post,
    path = "/db/manage/operation",
    tag = "manage",
    request_body(content = DatabaseOperationForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "操作成功，附带最新数据库列表", body = ApiResponse<PageView>),
        (status = 400, description = "表单校验失败或操作无效"),
        (status = 500, description = "操作失败")
    )
)]
pub async fn database_operation(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<DatabaseOperationForm>, FormRejection>,
) -> Response {
    let view = PageView::new(PageKind::Manage);
    let mut form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            let err = invalid_form(rejection.body_text());
            return failure(&state, &headers, view, &err, err.to_string()).await;
        }
    };

    let (connection, operation) = match form.resolve() {
        Ok(resolved) => resolved,
        Err(err) => {
            return failure(&state, &headers, view.with_operation(form), &err, err.to_string())
                .await;
        }
    };

    if let Err(err) = state.service.run_operation(&connection, &operation).await {
        let action = format!("{} database", operation.kind());
        let message = state.service.describe_failure(&action, &err);
        return failure(&state, &headers, view.with_operation(form), &err, message).await;
    }

    // 操作成功后刷新列表，失败只记录日志
    let databases = match state.service.list_databases(&connection).await {
        Ok(databases) => Some(databases),
        Err(err) => {
            tracing::warn!(error = %err, "failed to list databases after operation");
            None
        }
    };

    let view = view
        .with_success(operation.success_message())
        .with_connection(form.connection_form())
        .with_databases(databases);
    page(&state, &headers, view).await
}

/// 未匹配任何路由时渲染错误页面
pub async fn not_found(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let err = AppError::NotFound(format!("Page not found: {}", uri.path()));
    let message = err.to_string();
    failure(&state, &headers, PageView::new(PageKind::Error), &err, message).await
}

/// 处理器 panic 时返回 500
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");
    AppError::Internal("Internal Server Error".to_string()).into_response()
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行状态", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    let tools: Vec<ToolStatus> = TOOLS
        .iter()
        .map(|name| ToolStatus {
            name: name.to_string(),
            available: find_on_path(name).is_some(),
        })
        .collect();
    let status = if tools.iter().all(|t| t.available) {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        tools,
    })
}

/// 健康检查响应
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态：所有工具可用时为 healthy，否则为 degraded
    pub status: String,
    /// 服务名称
    pub service: String,
    /// 服务版本
    pub version: String,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
    /// 命令行工具在 PATH 中的可用情况
    pub tools: Vec<ToolStatus>,
}

/// 命令行工具状态
#[derive(Debug, Serialize, ToSchema)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
}
