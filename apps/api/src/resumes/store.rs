use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::kv::KvStore;
use crate::models::resume::{resume_key, ResumeRecord, RESUME_KEY_PREFIX};

pub async fn save_record(kv: &dyn KvStore, record: &ResumeRecord) -> Result<(), AppError> {
    let value = serde_json::to_string(record).map_err(anyhow::Error::from)?;
    kv.set(&record.kv_key(), &value).await?;
    Ok(())
}

pub async fn load_record(kv: &dyn KvStore, id: Uuid) -> Result<Option<ResumeRecord>, AppError> {
    let Some(raw) = kv.get(&resume_key(id)).await? else {
        return Ok(None);
    };
    let record = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("resume record {id} is unreadable: {e}"))?;
    Ok(Some(record))
}

/// All stored records, newest first. Unreadable entries are skipped.
pub async fn list_records(kv: &dyn KvStore) -> Result<Vec<ResumeRecord>, AppError> {
    let mut records: Vec<ResumeRecord> = kv
        .list(RESUME_KEY_PREFIX)
        .await?
        .into_iter()
        .filter_map(|entry| match serde_json::from_str(&entry.value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping unreadable record {}: {e}", entry.key);
                None
            }
        })
        .collect();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(records)
}
