use std::sync::Arc;

use crate::config::Config;
use crate::errors::AppError;
use crate::llm_client::ChatModel;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Built once at startup. `None` when no provider credential is configured.
    pub model: Option<Arc<dyn ChatModel>>,
}

impl AppState {
    pub fn new(config: Config, model: Option<Arc<dyn ChatModel>>) -> Self {
        Self {
            config: Arc::new(config),
            model,
        }
    }

    /// The configured model, or `ModelUnavailable` for the handler to return.
    pub fn model(&self) -> Result<&dyn ChatModel, AppError> {
        self.model.as_deref().ok_or(AppError::ModelUnavailable)
    }
}
