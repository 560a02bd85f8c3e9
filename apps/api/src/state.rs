use std::sync::Arc;

use crate::config::Config;
use crate::feedback::FeedbackProvider;
use crate::kv::KvStore;
use crate::previews::PreviewLeases;
use crate::raster::Rasterizer;
use crate::session::SessionProvider;
use crate::storage::BlobStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub rasterizer: Arc<Rasterizer>,
    pub blobs: Arc<dyn BlobStore>,
    pub kv: Arc<dyn KvStore>,
    pub sessions: Arc<dyn SessionProvider>,
    pub feedback: Arc<dyn FeedbackProvider>,
    /// Object URLs handed out by the preview endpoint, kept until released.
    pub previews: Arc<PreviewLeases>,
}
