//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::target::{ScrapeTarget, WaitPolicy};
use crate::traits::{Extractor, PageContext, SessionManager};

// ---------------------------------------------------------------------------
// MockSessions
// ---------------------------------------------------------------------------

/// The step of a page's lifecycle at which a planned failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailStage {
    Open,
    Navigate,
    WaitReady,
    Content,
}

/// A failure planned for one page.
#[derive(Debug)]
pub struct PlannedFailure {
    pub stage: FailStage,
    pub error: AppError,
}

impl PlannedFailure {
    pub fn new(stage: FailStage, error: AppError) -> Self {
        Self { stage, error }
    }
}

/// Counters and call logs shared by a [`MockSessions`] and its pages.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub open_attempts: usize,
    pub opened: usize,
    pub closed: usize,
    pub invalidated: usize,
    pub navigations: Vec<(String, WaitPolicy)>,
    pub ready_selectors: Vec<String>,
}

/// Instrumented fake session manager.
///
/// Every `open_page` pops the next planned failure (if any); pages serve the
/// configured HTML and record navigations and closes.
#[derive(Clone)]
pub struct MockSessions {
    html: Arc<Mutex<String>>,
    failures: Arc<Mutex<VecDeque<Option<PlannedFailure>>>>,
    running: Arc<Mutex<bool>>,
    pub log: Arc<Mutex<SessionLog>>,
}

impl MockSessions {
    pub fn new(html: &str) -> Self {
        Self {
            html: Arc::new(Mutex::new(html.to_string())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
            running: Arc::new(Mutex::new(false)),
            log: Arc::new(Mutex::new(SessionLog::default())),
        }
    }

    /// Plans a failure for the next opened page.
    pub fn fail_next(&self, stage: FailStage, error: AppError) {
        self.failures
            .lock()
            .unwrap()
            .push_back(Some(PlannedFailure::new(stage, error)));
    }

    /// Plans a clean run for the next opened page.
    pub fn succeed_next(&self) {
        self.failures.lock().unwrap().push_back(None);
    }

    pub fn set_html(&self, html: &str) {
        *self.html.lock().unwrap() = html.to_string();
    }

    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }

    pub fn open_attempts(&self) -> usize {
        self.log.lock().unwrap().open_attempts
    }

    pub fn invalidated(&self) -> usize {
        self.log.lock().unwrap().invalidated
    }
}

impl SessionManager for MockSessions {
    type Page = MockPage;

    async fn open_page(&self, _target: &ScrapeTarget) -> Result<MockPage, AppError> {
        let planned = self.failures.lock().unwrap().pop_front().flatten();
        self.log.lock().unwrap().open_attempts += 1;

        let failure = match planned {
            Some(PlannedFailure {
                stage: FailStage::Open,
                error,
            }) => return Err(error),
            other => other,
        };

        *self.running.lock().unwrap() = true;
        self.log.lock().unwrap().opened += 1;

        Ok(MockPage {
            html: self.html.lock().unwrap().clone(),
            failure,
            log: Arc::clone(&self.log),
        })
    }

    async fn invalidate(&self) {
        *self.running.lock().unwrap() = false;
        self.log.lock().unwrap().invalidated += 1;
    }

    async fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }
}

/// Page handed out by [`MockSessions`].
pub struct MockPage {
    html: String,
    failure: Option<PlannedFailure>,
    log: Arc<Mutex<SessionLog>>,
}

impl MockPage {
    fn fail_at(&mut self, stage: FailStage) -> Result<(), AppError> {
        match self.failure.take() {
            Some(planned) if planned.stage == stage => Err(planned.error),
            other => {
                self.failure = other;
                Ok(())
            }
        }
    }
}

impl PageContext for MockPage {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        _timeout: Duration,
    ) -> Result<(), AppError> {
        self.log
            .lock()
            .unwrap()
            .navigations
            .push((url.to_string(), wait));
        self.fail_at(FailStage::Navigate)
    }

    async fn wait_for_ready(&mut self, selector: &str, _timeout: Duration) -> Result<(), AppError> {
        self.log
            .lock()
            .unwrap()
            .ready_selectors
            .push(selector.to_string());
        self.fail_at(FailStage::WaitReady)
    }

    async fn content(&mut self) -> Result<String, AppError> {
        self.fail_at(FailStage::Content)?;
        Ok(self.html.clone())
    }

    async fn close(self) {
        self.log.lock().unwrap().closed += 1;
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns queued results, then `T::default()`.
#[derive(Clone)]
pub struct MockExtractor<T> {
    responses: Arc<Mutex<Vec<Result<T, AppError>>>>,
    pub inputs: Arc<Mutex<Vec<String>>>,
}

impl<T> MockExtractor<T> {
    pub fn new(value: T) -> Self {
        Self::with_responses(vec![Ok(value)])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<T, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues another result behind the existing ones.
    pub fn push(&self, response: Result<T, AppError>) {
        self.responses.lock().unwrap().push(response);
    }
}

impl<T> Extractor for MockExtractor<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    type Output = T;

    fn extract(&self, html: &str) -> Result<T, AppError> {
        self.inputs.lock().unwrap().push(html.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(T::default())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Targets with tiny timeouts, pointing at unroutable test hosts.
pub fn make_test_targets() -> (ScrapeTarget, ScrapeTarget) {
    let performance = ScrapeTarget::performance("https://dashboard.test/performance")
        .with_timeouts(Duration::from_millis(100), Duration::from_millis(100));
    let jobs = ScrapeTarget::jobs("10.0.0")
        .with_timeouts(Duration::from_millis(100), Duration::from_millis(100));
    (performance, jobs)
}
