use serde::{Deserialize, Serialize};

use scrapegate_core::models::JobGroup;

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// `?machine=` is kept as a raw string so a missing or non-numeric value
/// gets the same 400 as an out-of-range one.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct JobsQuery {
    /// Device number, 71 to 110.
    pub machine: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobsResponse {
    pub extracted_data: Vec<JobGroupResponse>,
}

/// Wire shape of one [`JobGroup`].
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobGroupResponse {
    pub pdf_file: String,
    pub data_rows: Vec<Vec<String>>,
}

impl From<JobGroup> for JobGroupResponse {
    fn from(group: JobGroup) -> Self {
        Self {
            pdf_file: group.pdf_file,
            data_rows: group.data_rows,
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    /// `running` once the shared browser is up, `idle` before first use.
    pub browser: &'static str,
    pub cached_entries: u64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
