use thiserror::Error;

/// Application-wide error types for scrapegate.
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller input was rejected before any browser work.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The upstream site rejected the configured credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Navigation did not reach its wait condition in time.
    #[error("Navigation timed out after {0} seconds")]
    NavigationTimeout(u64),

    /// The readiness selector never appeared.
    #[error("Selector '{selector}' did not appear within {secs} seconds")]
    ReadinessTimeout { selector: String, secs: u64 },

    /// The browser reported a navigation failure (DNS, refused connection, ...).
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// A page-level browser command failed (the session itself may be fine).
    #[error("Page error: {0}")]
    Page(String),

    /// The rendered DOM did not have the expected shape.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Launching or talking to the browser failed.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Coarse classification of an [`AppError`], consumed by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Timeout,
    Extraction,
    Upstream,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Authentication(_) => ErrorKind::Authentication,
            AppError::NavigationTimeout(_) | AppError::ReadinessTimeout { .. } => {
                ErrorKind::Timeout
            }
            AppError::Extraction(_) => ErrorKind::Extraction,
            AppError::Navigation(_) | AppError::Page(_) | AppError::Browser(_) => {
                ErrorKind::Upstream
            }
            AppError::ConfigError(_) | AppError::SerializationError(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the browser session itself is suspect after this error.
    ///
    /// Page-level failures (timeouts, bad DOM, rejected credentials) leave the
    /// shared session alive for reuse.
    pub fn is_session_fault(&self) -> bool {
        matches!(self, AppError::Browser(_))
    }
}
