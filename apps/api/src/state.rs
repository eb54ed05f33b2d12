use std::sync::Arc;

use crate::config::FeatureFlags;
use crate::llm_client::ChatModel;
use crate::storage::Repository;
use crate::video::VideoStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    /// Groq client in production; `UnconfiguredModel` when no key is set.
    pub llm: Arc<dyn ChatModel>,
    /// Present only when video storage is enabled and S3 is configured.
    pub videos: Option<VideoStore>,
    pub features: FeatureFlags,
}
