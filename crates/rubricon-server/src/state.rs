use std::sync::Arc;

use rubricon_jobs::JobQueue;
use rubricon_store::Store;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub jobs: JobQueue,
}
