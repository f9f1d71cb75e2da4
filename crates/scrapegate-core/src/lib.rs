pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod scrape;
pub mod target;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use cache::TimedCache;
pub use config::ScrapeConfig;
pub use error::{AppError, ErrorKind};
pub use models::{JobGroup, MachineId};
pub use scrape::ScrapeService;
pub use target::{Credentials, ScrapeTarget, TargetKind, WaitPolicy};
pub use traits::{Extractor, PageContext, SessionManager};
