//! Bearer-token sessions persisted in the KV store, plus the route guard.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::kv::{KvError, KvStore};
use crate::state::AppState;

const SESSION_PREFIX: &str = "session:";
const MIN_STORE_TTL: std::time::Duration = std::time::Duration::from_secs(1);

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn is_authenticated(&self, token: &str) -> Result<bool, KvError>;

    /// Exchanges an access key for a session token. `None` for unknown keys.
    async fn sign_in(&self, access_key: &str) -> Result<Option<String>, KvError>;

    async fn sign_out(&self, token: &str) -> Result<(), KvError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    expires_at: DateTime<Utc>,
}

pub struct KvSessions {
    kv: Arc<dyn KvStore>,
    access_keys: Vec<String>,
    ttl: Duration,
}

impl KvSessions {
    pub fn new(kv: Arc<dyn KvStore>, access_keys: Vec<String>, ttl: Duration) -> Self {
        Self {
            kv,
            access_keys,
            ttl,
        }
    }
}

#[async_trait]
impl SessionProvider for KvSessions {
    async fn is_authenticated(&self, token: &str) -> Result<bool, KvError> {
        let key = format!("{SESSION_PREFIX}{token}");
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(false);
        };

        let record = match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("Discarding unreadable session record: {e}");
                self.kv.delete(&key).await?;
                return Ok(false);
            }
        };

        if record.expires_at <= Utc::now() {
            self.kv.delete(&key).await?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn sign_in(&self, access_key: &str) -> Result<Option<String>, KvError> {
        if access_key.is_empty() || !self.access_keys.iter().any(|k| k == access_key) {
            return Ok(None);
        }

        let token = Uuid::new_v4().simple().to_string();
        let record = SessionRecord {
            expires_at: Utc::now() + self.ttl,
        };
        let value = serde_json::to_string(&record)?;
        // The store expires the key too, so abandoned tokens do not linger
        let ttl = self.ttl.to_std().unwrap_or_default().max(MIN_STORE_TTL);
        self.kv
            .set_with_ttl(&format!("{SESSION_PREFIX}{token}"), &value, ttl)
            .await?;

        info!("Session started (expires {})", record.expires_at);
        Ok(Some(token))
    }

    async fn sign_out(&self, token: &str) -> Result<(), KvError> {
        self.kv.delete(&format!("{SESSION_PREFIX}{token}")).await?;
        Ok(())
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Rejects requests without a live session.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    if !state.sessions.is_authenticated(token).await? {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}
