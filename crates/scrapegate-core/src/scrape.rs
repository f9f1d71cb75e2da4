use std::time::Instant;

use crate::cache::TimedCache;
use crate::error::AppError;
use crate::models::{JobGroup, MachineId};
use crate::target::ScrapeTarget;
use crate::traits::{Extractor, PageContext, SessionManager};

/// Orchestrates one scrape: check cache → open page → navigate → wait ready →
/// extract → close page → update cache.
///
/// Generic over the session manager and both extraction rules via traits,
/// so the control flow is testable without a real browser.
pub struct ScrapeService<S, N, J>
where
    S: SessionManager,
    N: Extractor<Output = Vec<String>>,
    J: Extractor<Output = Vec<JobGroup>>,
{
    sessions: S,
    numbers: N,
    job_table: J,
    performance_target: ScrapeTarget,
    jobs_target: ScrapeTarget,
    performance_cache: TimedCache<Vec<String>>,
    jobs_cache: TimedCache<Vec<JobGroup>>,
}

impl<S, N, J> ScrapeService<S, N, J>
where
    S: SessionManager,
    N: Extractor<Output = Vec<String>>,
    J: Extractor<Output = Vec<JobGroup>>,
{
    /// Create a service; each target's cache window sizes its cache.
    pub fn new(
        sessions: S,
        numbers: N,
        job_table: J,
        performance_target: ScrapeTarget,
        jobs_target: ScrapeTarget,
    ) -> Self {
        let performance_cache = TimedCache::new(performance_target.cache_window);
        let jobs_cache = TimedCache::new(jobs_target.cache_window);

        Self {
            sessions,
            numbers,
            job_table,
            performance_target,
            jobs_target,
            performance_cache,
            jobs_cache,
        }
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    /// Approximate number of cached results across both targets.
    pub fn cached_entries(&self) -> u64 {
        self.performance_cache.entry_count() + self.jobs_cache.entry_count()
    }

    /// KPI numbers from the performance dashboard.
    pub async fn performance(&self) -> Result<Vec<String>, AppError> {
        self.fetch(
            &self.performance_target,
            None,
            &self.numbers,
            &self.performance_cache,
        )
        .await
    }

    /// Job groups for a raw machine number, validated before any browser work.
    pub async fn jobs(&self, raw_machine: &str) -> Result<Vec<JobGroup>, AppError> {
        let machine: MachineId = raw_machine.parse()?;
        self.jobs_for(machine).await
    }

    pub async fn jobs_for(&self, machine: MachineId) -> Result<Vec<JobGroup>, AppError> {
        self.fetch(
            &self.jobs_target,
            Some(machine),
            &self.job_table,
            &self.jobs_cache,
        )
        .await
    }

    async fn fetch<E: Extractor>(
        &self,
        target: &ScrapeTarget,
        machine: Option<MachineId>,
        extractor: &E,
        cache: &TimedCache<E::Output>,
    ) -> Result<E::Output, AppError> {
        let key = target.cache_key(machine);
        if let Some(hit) = cache.get(&key).await {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(hit);
        }

        let url = target.url_for(machine)?;
        tracing::info!(key = %key, "Cache miss, scraping {}", url);
        let started = Instant::now();

        let mut page = match self.sessions.open_page(target).await {
            Ok(page) => page,
            Err(e) => {
                self.on_failure(&key, &e).await;
                return Err(e);
            }
        };

        // From here on the page is closed exactly once, whatever happens.
        let outcome = Self::drive(&mut page, target, url.as_str(), extractor).await;
        page.close().await;

        match outcome {
            Ok(value) => {
                cache.put(key.clone(), value.clone()).await;
                tracing::info!(
                    key = %key,
                    elapsed_ms = %started.elapsed().as_millis(),
                    "Scrape complete"
                );
                Ok(value)
            }
            Err(e) => {
                self.on_failure(&key, &e).await;
                Err(e)
            }
        }
    }

    async fn drive<P: PageContext, E: Extractor>(
        page: &mut P,
        target: &ScrapeTarget,
        url: &str,
        extractor: &E,
    ) -> Result<E::Output, AppError> {
        page.navigate(url, target.wait_policy, target.navigation_timeout).await?;
        page.wait_for_ready(&target.ready_selector, target.ready_timeout).await?;
        let html = page.content().await?;
        tracing::debug!("Rendered {} bytes of HTML", html.len());
        extractor.extract(&html)
    }

    async fn on_failure(&self, key: &str, error: &AppError) {
        tracing::error!(key = %key, error = %error, "Scrape failed");
        if error.is_session_fault() {
            tracing::warn!("Dropping browser session after session-level failure");
            self.sessions.invalidate().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testutil::*;

    type TestService =
        ScrapeService<MockSessions, MockExtractor<Vec<String>>, MockExtractor<Vec<JobGroup>>>;

    fn service(sessions: MockSessions) -> TestService {
        let (performance, jobs) = make_test_targets();
        ScrapeService::new(
            sessions,
            MockExtractor::new(vec!["12".to_string(), "3.5".to_string()]),
            MockExtractor::new(vec![JobGroup::new("a.pdf")]),
            performance,
            jobs,
        )
    }

    fn service_with_windows(sessions: MockSessions, window: Duration) -> TestService {
        let (performance, jobs) = make_test_targets();
        ScrapeService::new(
            sessions,
            MockExtractor::with_responses(vec![
                Ok(vec!["1".to_string()]),
                Ok(vec!["2".to_string()]),
            ]),
            MockExtractor::<Vec<JobGroup>>::new(vec![]),
            performance.with_cache_window(window),
            jobs.with_cache_window(window),
        )
    }

    #[tokio::test]
    async fn happy_path_performance() {
        let sessions = MockSessions::new("<div class=\"text number\">12</div>");
        let svc = service(sessions.clone());

        let numbers = svc.performance().await.unwrap();

        assert_eq!(numbers, vec!["12", "3.5"]);
        assert_eq!(sessions.opened(), 1);
        assert_eq!(sessions.closed(), 1);

        let log = sessions.log.lock().unwrap();
        assert_eq!(log.navigations[0].0, "https://dashboard.test/performance");
        assert_eq!(log.ready_selectors, vec![".text.number"]);
    }

    #[tokio::test]
    async fn extractor_sees_rendered_html() {
        let sessions = MockSessions::new("<table><tr><td>x</td></tr></table>");
        let (performance, jobs) = make_test_targets();
        let table = MockExtractor::<Vec<JobGroup>>::new(vec![]);
        let svc = ScrapeService::new(
            sessions,
            MockExtractor::<Vec<String>>::new(vec![]),
            table.clone(),
            performance,
            jobs,
        );

        svc.jobs("80").await.unwrap();

        assert_eq!(
            table.inputs.lock().unwrap().as_slice(),
            ["<table><tr><td>x</td></tr></table>"]
        );
    }

    #[tokio::test]
    async fn second_request_within_window_is_served_from_cache() {
        let sessions = MockSessions::new("<html></html>");
        let svc = service_with_windows(sessions.clone(), Duration::from_secs(60));

        let first = svc.performance().await.unwrap();
        let second = svc.performance().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(sessions.open_attempts(), 1);
    }

    #[tokio::test]
    async fn request_after_window_fetches_exactly_once_more() {
        let sessions = MockSessions::new("<html></html>");
        let svc = service_with_windows(sessions.clone(), Duration::from_millis(50));

        assert_eq!(svc.performance().await.unwrap(), vec!["1"]);
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(svc.performance().await.unwrap(), vec!["2"]);
        assert_eq!(svc.performance().await.unwrap(), vec!["2"]);
        assert_eq!(sessions.open_attempts(), 2);
    }

    #[tokio::test]
    async fn machines_cache_independently() {
        let sessions = MockSessions::new("<html></html>");
        let svc = service(sessions.clone());

        svc.jobs("71").await.unwrap();
        svc.jobs("72").await.unwrap();
        svc.jobs("71").await.unwrap();

        assert_eq!(sessions.open_attempts(), 2);
        let log = sessions.log.lock().unwrap();
        assert_eq!(log.navigations[0].0, "http://10.0.0.71/jobs");
        assert_eq!(log.navigations[1].0, "http://10.0.0.72/jobs");
    }

    #[tokio::test]
    async fn invalid_machine_never_touches_the_browser() {
        let sessions = MockSessions::new("<html></html>");
        let svc = service(sessions.clone());

        for raw in ["70", "111", "abc", "", "7l", "-80"] {
            let err = svc.jobs(raw).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{raw:?}");
        }

        assert_eq!(sessions.open_attempts(), 0);
    }

    #[tokio::test]
    async fn every_valid_machine_is_accepted() {
        let sessions = MockSessions::new("<html></html>");
        let svc = service(sessions.clone());

        for n in 71..=110 {
            svc.jobs(&n.to_string()).await.unwrap();
        }

        assert_eq!(sessions.open_attempts(), 40);
    }

    #[tokio::test]
    async fn navigation_failure_closes_page_and_skips_cache() {
        let sessions = MockSessions::new("<html></html>");
        sessions.fail_next(FailStage::Navigate, AppError::NavigationTimeout(30));
        let svc = service(sessions.clone());

        let err = svc.performance().await.unwrap_err();
        assert!(matches!(err, AppError::NavigationTimeout(30)));
        assert_eq!(sessions.opened(), 1);
        assert_eq!(sessions.closed(), 1);

        // The failure did not refresh the cache: the retry goes upstream.
        svc.performance().await.unwrap();
        assert_eq!(sessions.open_attempts(), 2);
        assert_eq!(sessions.closed(), 2);
    }

    #[tokio::test]
    async fn extraction_failure_closes_page() {
        let sessions = MockSessions::new("<html></html>");
        let (performance, jobs) = make_test_targets();
        let svc = ScrapeService::new(
            sessions.clone(),
            MockExtractor::<Vec<String>>::with_error(AppError::Extraction("no numbers".into())),
            MockExtractor::<Vec<JobGroup>>::new(vec![]),
            performance,
            jobs,
        );

        let err = svc.performance().await.unwrap_err();

        assert!(matches!(err, AppError::Extraction(_)));
        assert_eq!(sessions.opened(), 1);
        assert_eq!(sessions.closed(), 1);
    }

    #[tokio::test]
    async fn authentication_failure_keeps_session() {
        let sessions = MockSessions::new("<html></html>");
        sessions.fail_next(
            FailStage::WaitReady,
            AppError::Authentication("credentials rejected".into()),
        );
        let svc = service(sessions.clone());

        let err = svc.performance().await.unwrap_err();

        assert!(matches!(err, AppError::Authentication(_)));
        assert_eq!(sessions.closed(), 1);
        assert_eq!(sessions.invalidated(), 0);
    }

    #[tokio::test]
    async fn open_failure_has_nothing_to_close() {
        let sessions = MockSessions::new("<html></html>");
        sessions.fail_next(
            FailStage::Open,
            AppError::Browser("failed to launch".into()),
        );
        let svc = service(sessions.clone());

        let err = svc.performance().await.unwrap_err();

        assert!(matches!(err, AppError::Browser(_)));
        assert_eq!(sessions.opened(), 0);
        assert_eq!(sessions.closed(), 0);
        assert_eq!(sessions.invalidated(), 1);
    }

    #[tokio::test]
    async fn session_fault_mid_page_invalidates_session() {
        let sessions = MockSessions::new("<html></html>");
        sessions.fail_next(
            FailStage::Content,
            AppError::Browser("CDP channel closed".into()),
        );
        let svc = service(sessions.clone());

        svc.performance().await.unwrap_err();

        assert_eq!(sessions.closed(), 1);
        assert_eq!(sessions.invalidated(), 1);
    }

    /// xorshift64; good enough to scatter failure injections.
    fn next_rand(state: &mut u64) -> u64 {
        let mut x = *state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        *state = x;
        x
    }

    #[tokio::test]
    async fn every_opened_page_is_closed_exactly_once() {
        let sessions = MockSessions::new("<html></html>");
        let (performance, jobs) = make_test_targets();
        let numbers = MockExtractor::<Vec<String>>::with_responses(vec![]);
        let table = MockExtractor::<Vec<JobGroup>>::with_responses(vec![]);
        let svc = ScrapeService::new(
            sessions.clone(),
            numbers.clone(),
            table.clone(),
            performance.with_cache_window(Duration::ZERO),
            jobs.with_cache_window(Duration::ZERO),
        );

        let mut seed = 0x9E37_79B9_7F4A_7C15u64;
        let mut planned_failures = 0usize;
        let mut observed_failures = 0usize;

        for i in 0..1000u64 {
            let use_jobs = i % 2 == 1;
            let stage = next_rand(&mut seed) % 6;
            match stage {
                0 => sessions.fail_next(FailStage::Open, AppError::Browser("launch".into())),
                1 => sessions.fail_next(FailStage::Navigate, AppError::NavigationTimeout(1)),
                2 => sessions.fail_next(
                    FailStage::WaitReady,
                    AppError::ReadinessTimeout {
                        selector: "table".into(),
                        secs: 1,
                    },
                ),
                3 => sessions.fail_next(FailStage::Content, AppError::Browser("gone".into())),
                4 => {
                    sessions.succeed_next();
                    let err = AppError::Extraction("unexpected shape".into());
                    if use_jobs {
                        table.push(Err(err));
                    } else {
                        numbers.push(Err(err));
                    }
                }
                _ => {
                    sessions.succeed_next();
                    if use_jobs {
                        table.push(Ok(vec![JobGroup::new("a.pdf")]));
                    } else {
                        numbers.push(Ok(vec!["1".to_string()]));
                    }
                }
            }
            if stage < 5 {
                planned_failures += 1;
            }

            let result = if use_jobs {
                let machine = 71 + (next_rand(&mut seed) % 40);
                svc.jobs(&machine.to_string()).await.map(|_| ())
            } else {
                svc.performance().await.map(|_| ())
            };
            if result.is_err() {
                observed_failures += 1;
            }

            let log = sessions.log.lock().unwrap();
            assert_eq!(log.opened, log.closed, "iteration {i}");
        }

        let log = sessions.log.lock().unwrap();
        assert_eq!(log.open_attempts, 1000);
        assert_eq!(log.opened, log.closed);
        assert_eq!(observed_failures, planned_failures);
        assert!(planned_failures > 0);
    }
}
