//! 导入导出与数据库管理服务
//!
//! 处理器只负责表单解析与页面渲染，所有命令行工具的调用都经由这里：
//! 选择方言、构建命令、执行、解析输出。

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tokio::fs::File;

use common::errors::{AppError, AppResult};
use common::models::{
    ConnectionRequest, DatabaseOperation, DatabaseRecord, ExportRequest, ImportRequest,
};
use common::utils::ArtifactName;

use crate::classifier::ErrorClassifier;
use crate::dialect::dialect_for;
use crate::rename;
use crate::runner::CommandRunner;

/// 导出生成的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// 文件名（不含目录），用于下载链接
    pub file_name: String,
    pub path: PathBuf,
}

/// 上传保存的 SQL 文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadArtifact {
    pub file_name: String,
    pub path: PathBuf,
}

/// 数据库导入导出服务
pub struct TransferService {
    export_dir: PathBuf,
    upload_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    classifier: Arc<dyn ErrorClassifier>,
}

impl TransferService {
    /// 创建服务实例
    pub fn new(
        export_dir: impl Into<PathBuf>,
        upload_dir: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        Self {
            export_dir: export_dir.into(),
            upload_dir: upload_dir.into(),
            runner,
            classifier,
        }
    }

    /// 导出数据库到 `<database>_<timestamp>.sql`
    ///
    /// 命令失败时不会留下导出文件。
    pub async fn export(&self, req: &ExportRequest) -> AppResult<ExportArtifact> {
        let dialect = dialect_for(req.connection.db_type);
        let timestamp = ArtifactName::timestamp(&Local::now());
        let file_name = ArtifactName::export(&req.database, &timestamp);
        let path = self.export_dir.join(&file_name);

        self.runner
            .run(dialect.export_command(&req.connection, &req.database, &path))
            .await?;

        tracing::info!(
            database = %req.database,
            db_type = %req.connection.db_type,
            path = %path.display(),
            "database exported"
        );
        Ok(ExportArtifact { file_name, path })
    }

    /// 为上传文件创建 `<timestamp>_<originalFilename>`，返回可写入的文件句柄
    pub async fn create_upload(&self, original_name: &str) -> AppResult<(UploadArtifact, File)> {
        let timestamp = ArtifactName::timestamp(&Local::now());
        let file_name = ArtifactName::upload(&timestamp, original_name);
        let path = self.upload_dir.join(&file_name);

        let file = File::create(&path)
            .await
            .map_err(|e| AppError::file_io("Failed to save uploaded file", e))?;

        tracing::info!(path = %path.display(), original = %original_name, "saving upload");
        Ok((UploadArtifact { file_name, path }, file))
    }

    /// 删除未使用的上传文件（尽力而为）
    pub async fn discard_upload(&self, upload: &UploadArtifact) {
        if let Err(e) = tokio::fs::remove_file(&upload.path).await {
            tracing::warn!(path = %upload.path.display(), error = %e, "failed to remove upload");
        }
    }

    /// 将已保存的上传文件导入数据库
    pub async fn import(&self, req: &ImportRequest) -> AppResult<()> {
        let dialect = dialect_for(req.connection.db_type);
        self.runner
            .run(dialect.import_command(&req.connection, &req.database, &req.file_path))
            .await?;

        tracing::info!(
            database = %req.database,
            db_type = %req.connection.db_type,
            file = %req.file_path.display(),
            "database imported"
        );
        Ok(())
    }

    /// 列出服务器上的用户数据库
    pub async fn list_databases(&self, conn: &ConnectionRequest) -> AppResult<Vec<DatabaseRecord>> {
        let dialect = dialect_for(conn.db_type);
        let output = self.runner.run(dialect.list_command(conn)).await?;
        Ok(dialect.parse_list_output(&output.stdout_text()))
    }

    /// 执行创建 / 重命名 / 删除
    pub async fn run_operation(
        &self,
        conn: &ConnectionRequest,
        operation: &DatabaseOperation,
    ) -> AppResult<()> {
        let dialect = dialect_for(conn.db_type);
        match operation {
            DatabaseOperation::Create { name } => {
                self.runner.run(dialect.create_command(conn, name)).await?;
            }
            DatabaseOperation::Drop { name } => {
                self.runner.run(dialect.drop_command(conn, name)).await?;
            }
            DatabaseOperation::Rename { from, to } => {
                let plan = dialect.rename_plan(conn, from, to);
                let outcome = rename::execute(self.runner.as_ref(), plan).await;
                tracing::info!(from = %from, to = %to, state = %outcome.state(), "rename finished");
                outcome.into_result()?;
            }
        }

        tracing::info!(
            operation = %operation.kind(),
            db_type = %conn.db_type,
            host = %conn.host,
            "database operation completed"
        );
        Ok(())
    }

    /// 将客户端提供的文件名解析为导出目录中的文件
    ///
    /// 只取最后一段路径，目录穿越无从发生。
    pub async fn resolve_download(&self, requested: Option<&str>) -> AppResult<ExportArtifact> {
        let requested = requested.unwrap_or_default();
        if requested.is_empty() {
            return Err(AppError::validation("No file specified", &["file"]));
        }

        let file_name = ArtifactName::basename(requested)
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
        let path = self.export_dir.join(&file_name);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(ExportArtifact { file_name, path }),
            _ => Err(AppError::NotFound("File not found".to_string())),
        }
    }

    /// 面向用户的错误信息
    ///
    /// 工具失败时格式为 `Failed to <action>: <error>`，附带 stderr 与修复建议；
    /// 其余错误原样返回。
    pub fn describe_failure(&self, action: &str, err: &AppError) -> String {
        match err {
            AppError::ProcessSpawn { .. }
            | AppError::ProcessExit { .. }
            | AppError::Rename { .. } => {
                let message = format!("Failed to {}: {}", action, err);
                match err.stderr() {
                    Some(stderr) => self
                        .classifier
                        .enrich(&format!("{}\nDetails: {}", message, stderr), stderr),
                    None => message,
                }
            }
            other => other.to_string(),
        }
    }
}
