pub mod extract;
pub mod session;

pub use extract::{JobTableExtractor, TraceNumberExtractor};
pub use session::{BrowserPage, BrowserSessions};
