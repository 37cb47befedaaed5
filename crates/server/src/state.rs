use std::sync::Arc;
use reuploader_core::{BatchTracker, Config, PublishPipeline};

/// Shared application state
pub struct AppState {
    config: Config,
    tracker: Arc<BatchTracker>,
    pipeline: Arc<PublishPipeline>,
}

impl AppState {
    pub fn new(config: Config, tracker: Arc<BatchTracker>, pipeline: Arc<PublishPipeline>) -> Self {
        Self {
            config,
            tracker,
            pipeline,
        }
    }

    #[allow(dead_code)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<BatchTracker> {
        &self.tracker
    }

    pub fn pipeline(&self) -> &Arc<PublishPipeline> {
        &self.pipeline
    }
}
