use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::AppError;
use crate::models::MIN_MACHINE;
use crate::target::{Credentials, ScrapeTarget};

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_DASHBOARD_URL: &str = "https://reporting.handwrytten.com/performance";
pub const DEFAULT_MACHINE_SUBNET: &str = "192.168.1";
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:5173"];

/// Service configuration shared by the server and the CLI.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub port: u16,
    pub dashboard_url: String,
    pub dashboard_credentials: Option<Credentials>,
    /// First three octets of the device network, e.g. `192.168.1`.
    pub machine_subnet: String,
    pub performance_cache: Duration,
    pub jobs_cache: Duration,
    pub navigation_timeout: Duration,
    pub ready_timeout: Duration,
    pub allowed_origins: Vec<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            dashboard_credentials: None,
            machine_subnet: DEFAULT_MACHINE_SUBNET.to_string(),
            performance_cache: Duration::from_secs(60),
            jobs_cache: Duration::from_secs(120),
            navigation_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(30),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ScrapeConfig {
    /// Read configuration from environment variables.
    ///
    /// - `PORT` (default 5001)
    /// - `DASHBOARD_URL`, `DASHBOARD_USERNAME`, `DASHBOARD_PASSWORD`
    /// - `MACHINE_SUBNET` (default `192.168.1`)
    /// - `PERFORMANCE_CACHE_SECS` (60), `JOBS_CACHE_SECS` (120)
    /// - `NAVIGATION_TIMEOUT_SECS` (30), `READY_TIMEOUT_SECS` (30)
    /// - `CORS_ALLOWED_ORIGINS` (comma separated)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            None => defaults.port,
            Some(raw) => raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!("Invalid PORT '{raw}': must be 0-65535"))
            })?,
        };

        let dashboard_url = lookup("DASHBOARD_URL").unwrap_or(defaults.dashboard_url);
        url::Url::parse(&dashboard_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid DASHBOARD_URL '{dashboard_url}': {e}"))
        })?;

        let dashboard_credentials =
            match (lookup("DASHBOARD_USERNAME"), lookup("DASHBOARD_PASSWORD")) {
                (Some(user), Some(pass)) => Some(Credentials::new(user, pass)),
                (None, None) => None,
                _ => {
                    return Err(AppError::ConfigError(
                        "DASHBOARD_USERNAME and DASHBOARD_PASSWORD must be set together".into(),
                    ));
                }
            };

        let machine_subnet = lookup("MACHINE_SUBNET").unwrap_or(defaults.machine_subnet);
        validate_subnet(&machine_subnet)?;

        let allowed_origins = match lookup("CORS_ALLOWED_ORIGINS") {
            None => defaults.allowed_origins,
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        };

        Ok(Self {
            port,
            dashboard_url,
            dashboard_credentials,
            machine_subnet,
            performance_cache: secs(&lookup, "PERFORMANCE_CACHE_SECS", defaults.performance_cache)?,
            jobs_cache: secs(&lookup, "JOBS_CACHE_SECS", defaults.jobs_cache)?,
            navigation_timeout: secs(
                &lookup,
                "NAVIGATION_TIMEOUT_SECS",
                defaults.navigation_timeout,
            )?,
            ready_timeout: secs(&lookup, "READY_TIMEOUT_SECS", defaults.ready_timeout)?,
            allowed_origins,
        })
    }

    pub fn performance_target(&self) -> ScrapeTarget {
        ScrapeTarget::performance(&self.dashboard_url)
            .with_credentials(self.dashboard_credentials.clone())
            .with_cache_window(self.performance_cache)
            .with_timeouts(self.navigation_timeout, self.ready_timeout)
    }

    pub fn jobs_target(&self) -> ScrapeTarget {
        ScrapeTarget::jobs(&self.machine_subnet)
            .with_cache_window(self.jobs_cache)
            .with_timeouts(self.navigation_timeout, self.ready_timeout)
    }
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, AppError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {key} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}

fn validate_subnet(subnet: &str) -> Result<(), AppError> {
    let probe = format!("{subnet}.{MIN_MACHINE}");
    if subnet.split('.').count() != 3 || probe.parse::<Ipv4Addr>().is_err() {
        return Err(AppError::ConfigError(format!(
            "Invalid MACHINE_SUBNET '{subnet}': expected three octets like 192.168.1"
        )));
    }
    Ok(())
}
