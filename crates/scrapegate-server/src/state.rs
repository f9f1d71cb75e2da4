use scrapegate_client::{JobTableExtractor, TraceNumberExtractor};
use scrapegate_core::ScrapeService;
use scrapegate_core::traits::SessionManager;

/// Shared application state, available to all route handlers via
/// `State<Arc<AppState<S>>>`.
///
/// Generic over the session manager so tests can run the real routes and
/// extractors against a scripted browser.
pub struct AppState<S: SessionManager> {
    pub service: ScrapeService<S, TraceNumberExtractor, JobTableExtractor>,
}

impl<S: SessionManager> AppState<S> {
    pub fn new(service: ScrapeService<S, TraceNumberExtractor, JobTableExtractor>) -> Self {
        Self { service }
    }
}
