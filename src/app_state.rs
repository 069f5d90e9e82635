use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    media::MediaTransform, notify::Notifier, providers::ProviderRegistry, queue::TaskQueue,
    storage::R2Client,
};

/// Shared application state passed to route handlers and task handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub queue: Arc<TaskQueue>,
    pub storage: Arc<R2Client>,
    pub notifier: Arc<Notifier>,
    pub media: Arc<MediaTransform>,
    pub providers: Arc<ProviderRegistry>,
    /// Shared client for artifact downloads.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        queue: TaskQueue,
        storage: R2Client,
        notifier: Notifier,
        media: MediaTransform,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            queue: Arc::new(queue),
            storage: Arc::new(storage),
            notifier: Arc::new(notifier),
            media: Arc::new(media),
            providers: Arc::new(providers),
            http: reqwest::Client::new(),
        }
    }
}
