//! Scrape targets: what to load, how to decide it has rendered, and how long
//! a result stays fresh.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::AppError;
use crate::models::MachineId;

const MACHINE_PLACEHOLDER: &str = "{machine}";

/// The two families of pages this service knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// The KPI dashboard (single fixed page).
    Performance,
    /// A device's `/jobs` table, one per machine.
    Jobs,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Performance => write!(f, "performance"),
            TargetKind::Jobs => write!(f, "jobs"),
        }
    }
}

/// HTTP credentials answered to the upstream site's auth challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Page lifecycle milestone that ends a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    Load,
    /// Does not block on long-lived network activity; preferred whenever a
    /// readiness selector follows.
    #[default]
    DomContentLoaded,
    NetworkAlmostIdle,
    NetworkIdle,
}

impl WaitPolicy {
    /// Name of the CDP `Page.lifecycleEvent` that satisfies this policy.
    pub fn lifecycle_event(self) -> &'static str {
        match self {
            WaitPolicy::Load => "load",
            WaitPolicy::DomContentLoaded => "DOMContentLoaded",
            WaitPolicy::NetworkAlmostIdle => "networkAlmostIdle",
            WaitPolicy::NetworkIdle => "networkIdle",
        }
    }
}

/// Everything the orchestrator needs to fetch one kind of page.
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    pub kind: TargetKind,
    /// Absolute URL, optionally containing `{machine}`.
    pub url_template: String,
    pub credentials: Option<Credentials>,
    pub ready_selector: String,
    pub wait_policy: WaitPolicy,
    /// Abort image, stylesheet and font requests.
    pub block_resources: bool,
    pub cache_window: Duration,
    pub navigation_timeout: Duration,
    pub ready_timeout: Duration,
}

impl ScrapeTarget {
    /// The KPI dashboard: 60 s freshness, waits for `.text.number`.
    pub fn performance(url: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Performance,
            url_template: url.into(),
            credentials: None,
            ready_selector: ".text.number".to_string(),
            wait_policy: WaitPolicy::DomContentLoaded,
            block_resources: true,
            cache_window: Duration::from_secs(60),
            navigation_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(30),
        }
    }

    /// Device job tables at `http://<subnet>.<machine>/jobs`: 120 s freshness.
    pub fn jobs(subnet: &str) -> Self {
        Self {
            kind: TargetKind::Jobs,
            url_template: format!("http://{subnet}.{MACHINE_PLACEHOLDER}/jobs"),
            credentials: None,
            ready_selector: "table".to_string(),
            wait_policy: WaitPolicy::DomContentLoaded,
            block_resources: true,
            cache_window: Duration::from_secs(120),
            navigation_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_cache_window(mut self, window: Duration) -> Self {
        self.cache_window = window;
        self
    }

    pub fn with_timeouts(mut self, navigation: Duration, ready: Duration) -> Self {
        self.navigation_timeout = navigation;
        self.ready_timeout = ready;
        self
    }

    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Whether the URL template needs a machine number.
    pub fn is_parameterized(&self) -> bool {
        self.url_template.contains(MACHINE_PLACEHOLDER)
    }

    /// Render the concrete URL for this target.
    pub fn url_for(&self, machine: Option<MachineId>) -> Result<Url, AppError> {
        let raw = match (self.is_parameterized(), machine) {
            (true, Some(id)) => self
                .url_template
                .replace(MACHINE_PLACEHOLDER, &id.to_string()),
            (true, None) => {
                return Err(AppError::ConfigError(format!(
                    "{} target needs a machine number",
                    self.kind
                )));
            }
            (false, _) => self.url_template.clone(),
        };

        Url::parse(&raw).map_err(|e| AppError::ConfigError(format!("Invalid URL '{raw}': {e}")))
    }

    /// Cache key: one per target, or one per machine for parameterized targets.
    pub fn cache_key(&self, machine: Option<MachineId>) -> String {
        match machine {
            Some(id) => format!("{}:{id}", self.kind),
            None => self.kind.to_string(),
        }
    }
}
