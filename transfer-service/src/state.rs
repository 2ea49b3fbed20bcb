//! Application state for transfer service.

use std::sync::Arc;

use common::config::AppConfig;

use crate::classifier::SubstringClassifier;
use crate::runner::{CommandRunner, ProcessRunner};
use crate::service::TransferService;
use crate::views::PageRenderer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub service: Arc<TransferService>,
    pub views: Arc<PageRenderer>,
}

impl AppState {
    /// Creates a new application state that runs the real client tools.
    pub fn new(config: AppConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner))
    }

    /// Creates application state with a custom command runner.
    pub fn with_runner(config: AppConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let service = TransferService::new(
            config.export_dir.clone(),
            config.upload_dir.clone(),
            runner,
            Arc::new(SubstringClassifier::default()),
        );
        let views = PageRenderer::new(
            config.service_name.clone(),
            config.template_dir.clone(),
            config.is_development(),
        );
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            views: Arc::new(views),
        }
    }
}
