use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::feedback::Feedback;

pub const RESUME_KEY_PREFIX: &str = "resume:";

/// Stored under `resume:<id>` in the KV store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: Uuid,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub resume_path: String,
    pub image_path: String,
    /// `None` until analysis completes.
    pub feedback: Option<Feedback>,
    pub created_at: DateTime<Utc>,
}

impl ResumeRecord {
    pub fn kv_key(&self) -> String {
        resume_key(self.id)
    }
}

pub fn resume_key(id: Uuid) -> String {
    format!("{RESUME_KEY_PREFIX}{id}")
}
