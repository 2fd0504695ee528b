//! FailedPage — a URL attempted but not ingested.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPage {
    pub id: Uuid,
    pub job_id: Uuid,
    pub url: String,
    pub error_message: String,
    pub failed_at: DateTime<Utc>,
    pub retry_generation: i32,
}
