//! 页面视图
//!
//! 每个处理器都产出一个 [`PageView`]。浏览器得到 HTML 页面，
//! `Accept: application/json` 的客户端得到同一视图的 JSON 包装。

use std::path::PathBuf;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{Datelike, Local};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use tokio::sync::OnceCell;
use utoipa::ToSchema;

use common::errors::AppError;
use common::models::{
    ConnectionForm, DatabaseOperationForm, DatabaseRecord, ExportForm, ImportForm,
};
use common::response::ApiResponse;

/// 页面种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Home,
    Export,
    Import,
    Manage,
    /// 未知路由与未捕获的错误
    Error,
}

impl PageKind {
    pub fn title(&self) -> &'static str {
        match self {
            PageKind::Home => "SQL Client - Export/Import Database",
            PageKind::Export => "Export Database",
            PageKind::Import => "Import Database",
            PageKind::Manage => "Manage Databases",
            PageKind::Error => "Error",
        }
    }
}

/// 页面视图模型
///
/// 表单字段原样回显，密码字段不参与序列化。
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageView {
    pub title: String,
    pub page: PageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 需要高亮的表单字段
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportForm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportForm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionForm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<DatabaseOperationForm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub databases: Option<Vec<DatabaseRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_filename: Option<String>,
    #[serde(skip)]
    error_code: Option<&'static str>,
}

impl PageView {
    pub fn new(page: PageKind) -> Self {
        Self {
            title: page.title().to_string(),
            page,
            success: None,
            error: None,
            error_fields: Vec::new(),
            export: None,
            import: None,
            connection: None,
            operation: None,
            databases: None,
            download_link: None,
            download_filename: None,
            error_code: None,
        }
    }

    pub fn with_success(mut self, message: impl Into<String>) -> Self {
        self.success = Some(message.into());
        self
    }

    /// 记录失败信息；`message` 为展示给用户的完整文本
    pub fn with_failure(mut self, err: &AppError, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self.error_fields = err.fields().to_vec();
        self.error_code = Some(err.code());
        self
    }

    pub fn with_export(mut self, form: ExportForm) -> Self {
        self.export = Some(form);
        self
    }

    pub fn with_import(mut self, form: ImportForm) -> Self {
        self.import = Some(form);
        self
    }

    pub fn with_connection(mut self, form: ConnectionForm) -> Self {
        self.connection = Some(form);
        self
    }

    pub fn with_operation(mut self, form: DatabaseOperationForm) -> Self {
        self.operation = Some(form);
        self
    }

    pub fn with_databases(mut self, databases: Option<Vec<DatabaseRecord>>) -> Self {
        self.databases = databases;
        self
    }

    pub fn with_download(mut self, file_name: &str) -> Self {
        let encoded = utf8_percent_encode(file_name, QUERY_VALUE);
        self.download_link = Some(format!("/db/download?file={}", encoded));
        self.download_filename = Some(file_name.to_string());
        self
    }
}

/// Characters left unescaped in a query value.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_');

/// 响应格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Html,
    Json,
}

impl ResponseFormat {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let wants_json = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains("application/json"));
        if wants_json {
            ResponseFormat::Json
        } else {
            ResponseFormat::Html
        }
    }
}

const LAYOUT_FILE: &str = "layout.html";

const BUILTIN_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{title}}</title>
    <script src="https://cdn.tailwindcss.com"></script>
    <link rel="stylesheet" href="/static/css/style.css">
</head>
<body class="bg-gray-100 min-h-screen flex flex-col">
    <nav class="bg-blue-600 text-white shadow">
        <div class="container mx-auto px-4 py-3 flex items-center justify-between">
            <a href="/" class="text-xl font-bold">SQL Client</a>
            <div class="space-x-4">
                <a href="/db/export" class="hover:underline">Export</a>
                <a href="/db/import" class="hover:underline">Import</a>
                <a href="/db/manage" class="hover:underline">Manage</a>
            </div>
        </div>
    </nav>
    <main class="container mx-auto px-4 py-8 flex-grow">
{{content}}
    </main>
    <footer class="bg-gray-800 text-gray-300 text-center py-4 text-sm">
        &copy; {{year}} SQL Client
    </footer>
    <script src="/static/js/main.js"></script>
</body>
</html>
"#;

/// HTML 页面渲染器
///
/// `template_dir/layout.html` 存在时替换内置布局。开发环境每次请求重新读取，
/// 其余环境只读取一次。
pub struct PageRenderer {
    service_name: String,
    template_dir: PathBuf,
    reload: bool,
    cached: OnceCell<Option<String>>,
}

impl PageRenderer {
    pub fn new(
        service_name: impl Into<String>,
        template_dir: impl Into<PathBuf>,
        reload: bool,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            template_dir: template_dir.into(),
            reload,
            cached: OnceCell::new(),
        }
    }

    /// 按请求格式输出视图
    pub async fn respond(
        &self,
        format: ResponseFormat,
        status: StatusCode,
        view: PageView,
    ) -> Response {
        match format {
            ResponseFormat::Json => self.respond_json(status, view),
            ResponseFormat::Html => (status, Html(self.render(&view).await)).into_response(),
        }
    }

    fn respond_json(&self, status: StatusCode, view: PageView) -> Response {
        match (view.error.clone(), view.error_code) {
            (Some(message), code) => {
                let code = code.unwrap_or("INTERNAL_ERROR");
                let body = ApiResponse::failed_with_data(view, code, message, &self.service_name);
                (status, Json(body)).into_response()
            }
            (None, _) => {
                let body = ApiResponse::ok_with_service(view, &self.service_name);
                (status, Json(body)).into_response()
            }
        }
    }

    /// 渲染完整 HTML 页面
    pub async fn render(&self, view: &PageView) -> String {
        let layout = self.layout().await;
        let layout = layout.as_deref().unwrap_or(BUILTIN_LAYOUT);
        layout
            .replace("{{title}}", &escape_html(&view.title))
            .replace("{{year}}", &Local::now().year().to_string())
            .replace("{{content}}", &render_content(view))
    }

    async fn layout(&self) -> Option<String> {
        if self.reload {
            return read_layout(&self.template_dir).await;
        }
        self.cached
            .get_or_init(|| read_layout(&self.template_dir))
            .await
            .clone()
    }
}

async fn read_layout(dir: &std::path::Path) -> Option<String> {
    let path = dir.join(LAYOUT_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(layout) => Some(layout),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read layout, using built-in"
            );
            None
        }
    }
}

/// Escapes text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Values to pre-fill, collected from whichever form the view echoes.
#[derive(Default)]
struct Prefill<'a> {
    db_type: &'a str,
    host: &'a str,
    port: &'a str,
    username: &'a str,
    database: &'a str,
    new_database: &'a str,
    operation: &'a str,
}

impl<'a> Prefill<'a> {
    fn from_view(view: &'a PageView) -> Self {
        if let Some(f) = &view.export {
            return Prefill {
                db_type: &f.db_type,
                host: &f.host,
                port: &f.port,
                username: &f.username,
                database: &f.database,
                ..Default::default()
            };
        }
        if let Some(f) = &view.import {
            return Prefill {
                db_type: &f.db_type,
                host: &f.host,
                port: &f.port,
                username: &f.username,
                database: &f.database,
                ..Default::default()
            };
        }
        if let Some(f) = &view.operation {
            return Prefill {
                db_type: &f.db_type,
                host: &f.host,
                port: &f.port,
                username: &f.username,
                database: &f.database,
                new_database: &f.new_database,
                operation: &f.operation,
            };
        }
        if let Some(f) = &view.connection {
            return Prefill {
                db_type: &f.db_type,
                host: &f.host,
                port: &f.port,
                username: &f.username,
                ..Default::default()
            };
        }
        Prefill::default()
    }
}

fn render_content(view: &PageView) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        "<h1 class=\"text-3xl font-bold mb-6\">{}</h1>\n",
        escape_html(&view.title)
    ));
    if let Some(success) = &view.success {
        html.push_str(&format!(
            "<div class=\"bg-green-100 border border-green-400 text-green-700 px-4 py-3 rounded mb-4\">{}</div>\n",
            escape_html(success)
        ));
    }
    if let Some(error) = &view.error {
        html.push_str(&format!(
            "<div class=\"bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded mb-4\"><pre class=\"whitespace-pre-wrap font-sans\">{}</pre></div>\n",
            escape_html(error)
        ));
    }

    let prefill = Prefill::from_view(view);
    match view.page {
        PageKind::Home => html.push_str(HOME_CONTENT),
        PageKind::Export => render_export(&mut html, view, &prefill),
        PageKind::Import => render_import(&mut html, view, &prefill),
        PageKind::Manage => render_manage(&mut html, view, &prefill),
        PageKind::Error => html.push_str(ERROR_CONTENT),
    }
    html
}

const HOME_CONTENT: &str = r#"<p class="mb-6 text-gray-700">Export, import and manage MySQL, MariaDB and PostgreSQL databases.</p>
<div class="grid md:grid-cols-3 gap-6">
    <a href="/db/export" class="block bg-white rounded shadow p-6 hover:shadow-lg"><h2 class="text-xl font-semibold mb-2">Export</h2><p>Dump a database to a SQL file.</p></a>
    <a href="/db/import" class="block bg-white rounded shadow p-6 hover:shadow-lg"><h2 class="text-xl font-semibold mb-2">Import</h2><p>Load a SQL file into a database.</p></a>
    <a href="/db/manage" class="block bg-white rounded shadow p-6 hover:shadow-lg"><h2 class="text-xl font-semibold mb-2">Manage</h2><p>List, create, rename and drop databases.</p></a>
</div>
"#;

const ERROR_CONTENT: &str =
    "<p><a href=\"/\" class=\"text-blue-600 underline\">Back to home</a></p>\n";

fn field_class(view: &PageView, name: &str) -> &'static str {
    if view.error_fields.iter().any(|f| f == name) {
        "w-full border border-red-500 rounded px-3 py-2"
    } else {
        "w-full border border-gray-300 rounded px-3 py-2"
    }
}

fn text_input(
    html: &mut String,
    view: &PageView,
    name: &str,
    label: &str,
    value: &str,
    required: bool,
) {
    html.push_str(&format!(
        "<div class=\"mb-4\"><label class=\"block text-gray-700 mb-1\" for=\"{name}\">{label}</label>\
         <input type=\"text\" id=\"{name}\" name=\"{name}\" value=\"{value}\" class=\"{class}\"{required}></div>\n",
        name = name,
        label = label,
        value = escape_html(value),
        class = field_class(view, name),
        required = if required { " required" } else { "" },
    ));
}

/// Type, host, port, username and an always-empty password.
fn connection_fields(html: &mut String, view: &PageView, prefill: &Prefill<'_>) {
    html.push_str(&format!(
        "<div class=\"mb-4\"><label class=\"block text-gray-700 mb-1\" for=\"type\">Database Type</label>\
         <select id=\"type\" name=\"type\" class=\"{}\">",
        field_class(view, "type")
    ));
    for (value, label) in [("mysql", "MySQL"), ("mariadb", "MariaDB"), ("postgres", "PostgreSQL")] {
        let selected = if prefill.db_type == value { " selected" } else { "" };
        html.push_str(&format!("<option value=\"{}\"{}>{}</option>", value, selected, label));
    }
    html.push_str("</select></div>\n");

    text_input(html, view, "host", "Host", prefill.host, true);
    text_input(html, view, "port", "Port", prefill.port, false);
    text_input(html, view, "username", "Username", prefill.username, true);
    html.push_str(&format!(
        "<div class=\"mb-4\"><label class=\"block text-gray-700 mb-1\" for=\"password\">Password</label>\
         <input type=\"password\" id=\"password\" name=\"password\" class=\"{}\"></div>\n",
        field_class(view, "password")
    ));
}

fn render_export(html: &mut String, view: &PageView, prefill: &Prefill<'_>) {
    if let (Some(link), Some(name)) = (&view.download_link, &view.download_filename) {
        html.push_str(&format!(
            "<p class=\"mb-4\"><a class=\"text-blue-600 underline\" href=\"{}\">Download {}</a></p>\n",
            escape_html(link),
            escape_html(name)
        ));
    }
    html.push_str(
        "<form method=\"POST\" action=\"/db/export\" class=\"bg-white rounded shadow p-6\">\n",
    );
    connection_fields(html, view, prefill);
    text_input(html, view, "database", "Database", prefill.database, true);
    html.push_str(
        "<button type=\"submit\" class=\"bg-blue-600 text-white px-4 py-2 rounded\">Export</button>\n\
         <button type=\"submit\" formaction=\"/db/export?download=true\" class=\"bg-gray-600 text-white px-4 py-2 rounded ml-2\">Export &amp; Download</button>\n\
         </form>\n",
    );
}

fn render_import(html: &mut String, view: &PageView, prefill: &Prefill<'_>) {
    html.push_str(
        "<form method=\"POST\" action=\"/db/import\" enctype=\"multipart/form-data\" class=\"bg-white rounded shadow p-6\">\n",
    );
    connection_fields(html, view, prefill);
    text_input(html, view, "database", "Database", prefill.database, true);
    html.push_str(&format!(
        "<div class=\"mb-4\"><label class=\"block text-gray-700 mb-1\">SQL File <span></span></label>\
         <input type=\"file\" name=\"sqlFile\" accept=\".sql\" class=\"{}\" required></div>\n",
        field_class(view, "sqlFile")
    ));
    html.push_str(
        "<button type=\"submit\" class=\"bg-blue-600 text-white px-4 py-2 rounded\">Import</button>\n\
         </form>\n",
    );
}

fn render_manage(html: &mut String, view: &PageView, prefill: &Prefill<'_>) {
    html.push_str(
        "<form method=\"POST\" action=\"/db/manage/list\" class=\"bg-white rounded shadow p-6 mb-6\">\n",
    );
    html.push_str("<h2 class=\"text-xl font-semibold mb-4\">Connection</h2>\n");
    connection_fields(html, view, prefill);
    html.push_str(
        "<button type=\"submit\" class=\"bg-blue-600 text-white px-4 py-2 rounded\">\
         List Databases</button>\n</form>\n",
    );

    if let Some(databases) = &view.databases {
        html.push_str(
            "<div class=\"bg-white rounded shadow p-6 mb-6\">\n\
             <h2 class=\"text-xl font-semibold mb-4\">Databases</h2>\n",
        );
        if databases.is_empty() {
            html.push_str("<p class=\"text-gray-600\">No user databases found.</p>\n");
        } else {
            html.push_str(
                "<table class=\"w-full text-left\"><thead><tr><th class=\"py-2\">Name</th>\
                 <th class=\"py-2\">Size</th></tr></thead><tbody>\n",
            );
            for db in databases {
                html.push_str(&format!(
                    "<tr class=\"border-t\"><td class=\"py-2\">{}</td><td class=\"py-2\">{}</td></tr>\n",
                    escape_html(&db.name),
                    escape_html(&db.size)
                ));
            }
            html.push_str("</tbody></table>\n");
        }
        html.push_str("</div>\n");
    }

    html.push_str(
        "<form method=\"POST\" action=\"/db/manage/operation\" class=\"bg-white rounded shadow p-6\">\n",
    );
    html.push_str("<h2 class=\"text-xl font-semibold mb-4\">Operation</h2>\n");
    connection_fields(html, view, prefill);
    html.push_str(&format!(
        "<div class=\"mb-4\"><label class=\"block text-gray-700 mb-1\" for=\"operation\">Operation</label>\
         <select id=\"operation\" name=\"operation\" class=\"{}\">",
        field_class(view, "operation")
    ));
    for value in ["create", "rename", "drop"] {
        let selected = if prefill.operation == value { " selected" } else { "" };
        html.push_str(&format!("<option value=\"{}\"{}>{}</option>", value, selected, value));
    }
    html.push_str("</select></div>\n");
    text_input(html, view, "database", "Database", prefill.database, false);
    text_input(html, view, "newDatabase", "New Database", prefill.new_database, false);
    html.push_str(
        "<button type=\"submit\" class=\"bg-red-600 text-white px-4 py-2 rounded\">Run</button>\n\
         </form>\n",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn renderer(dir: &std::path::Path, reload: bool) -> PageRenderer {
        PageRenderer::new("transfer-service", dir, reload)
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"x\" & 'y'</b>"),
            "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_response_format() {
        let mut headers = HeaderMap::new();
        assert_eq!(ResponseFormat::from_headers(&headers), ResponseFormat::Html);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json, text/plain"));
        assert_eq!(ResponseFormat::from_headers(&headers), ResponseFormat::Json);
    }

    #[tokio::test]
    async fn test_password_never_rendered_and_values_echoed() {
        let dir = tempfile::tempdir().unwrap();
        let form = ExportForm {
            db_type: "postgres".into(),
            host: "db.example.com".into(),
            port: "5432".into(),
            database: "<shop>".into(),
            username: "admin".into(),
            password: "s3cret".into(),
        };
        let err = AppError::validation("Please fill in all required fields", &["database"]);
        let view = PageView::new(PageKind::Export)
            .with_failure(&err, err.to_string())
            .with_export(form);
        let html = renderer(dir.path(), true).render(&view).await;

        assert!(!html.contains("s3cret"));
        assert!(html.contains("value=\"db.example.com\""));
        assert!(html.contains("value=\"&lt;shop&gt;\""));
        assert!(html.contains("<option value=\"postgres\" selected>"));
        assert!(html.contains(
            "name=\"database\" value=\"&lt;shop&gt;\" class=\"w-full border border-red-500"
        ));

        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_custom_layout_reloaded_in_development() {
        let dir = tempfile::tempdir().unwrap();
        let view = PageView::new(PageKind::Home);
        let pages = renderer(dir.path(), true);

        assert!(pages.render(&view).await.contains("<nav"));

        std::fs::write(
            dir.path().join("layout.html"),
            "<title>{{title}}</title><main>{{content}}</main>",
        )
        .unwrap();
        let html = pages.render(&view).await;
        assert!(html.starts_with("<title>SQL Client - Export/Import Database</title><main>"));
        assert!(!html.contains("<nav"));
    }

    #[tokio::test]
    async fn test_layout_cached_outside_development() {
        let dir = tempfile::tempdir().unwrap();
        let view = PageView::new(PageKind::Home);
        let pages = renderer(dir.path(), false);

        let first = pages.render(&view).await;
        std::fs::write(dir.path().join("layout.html"), "{{content}}").unwrap();
        let second = pages.render(&view).await;
        assert!(first.contains("<nav"));
        assert!(second.contains("<nav"));
    }

    #[tokio::test]
    async fn test_json_failure_carries_view() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppError::InvalidOperation("truncate".into());
        let view = PageView::new(PageKind::Manage).with_failure(&err, err.to_string());
        let response = renderer(dir.path(), true)
            .respond(ResponseFormat::Json, err.status_code(), view)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_download_link() {
        let view = PageView::new(PageKind::Export).with_download("shop_20240101_000000.sql");
        assert_eq!(
            view.download_link.as_deref(),
            Some("/db/download?file=shop_20240101_000000.sql")
        );
    }

    #[test]
    fn test_download_link_is_percent_encoded() {
        let view = PageView::new(PageKind::Export).with_download("r&d #1+x%_20240101.sql");
        assert_eq!(
            view.download_link.as_deref(),
            Some("/db/download?file=r%26d%20%231%2Bx%25_20240101.sql")
        );
        assert_eq!(view.download_filename.as_deref(), Some("r&d #1+x%_20240101.sql"));
    }
}
