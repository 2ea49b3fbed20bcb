//! 数据库导入导出服务入口

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use common::config::{AppConfig, LogFormat};
use transfer_service::{create_router, state::AppState, SERVICE_NAME};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 先加载 .env（不存在时忽略）
    dotenvy::dotenv().ok();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);

    // 初始化日志追踪
    init_tracing(config.log_format);

    // 导出 / 上传目录创建失败时终止启动
    config
        .ensure_directories()
        .context("创建导出或上传目录失败")?;

    let addr = config.bind_address();
    info!(
        service = SERVICE_NAME,
        address = %addr,
        environment = %config.environment,
        export_dir = %config.export_dir.display(),
        upload_dir = %config.upload_dir.display(),
        "启动服务"
    );

    let app = create_router(AppState::new(config));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app).await.context("服务运行失败")?;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
