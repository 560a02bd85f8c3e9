//! On-demand page previews served through object URLs.
//!
//! A created preview keeps its handle in [`PreviewLeases`] until the client
//! releases it or the lease expires; only then is the image memory freed.

use std::collections::HashMap;
use std::num::NonZeroU16;
use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::raster::converter::FIRST_PAGE;
use crate::raster::{ConversionRequest, ObjectUrl};
use crate::routes::blob_response;
use crate::state::AppState;
use crate::upload::read_upload_form;

struct Lease {
    handle: ObjectUrl,
    expires_at: DateTime<Utc>,
}

/// Preview handles held on behalf of clients. Leases expire after `ttl` and
/// at most `capacity` are held at once; the oldest is released to make room.
pub struct PreviewLeases {
    ttl: Duration,
    capacity: usize,
    leases: Mutex<HashMap<Uuid, Lease>>,
}

impl PreviewLeases {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            leases: Mutex::new(HashMap::new()),
        }
    }

    /// Takes ownership of `handle` until it is released or expires.
    pub fn hold(&self, handle: ObjectUrl) -> Uuid {
        let now = Utc::now();
        let id = handle.id();
        let mut leases = self.leases();
        sweep(&mut leases, now);

        while leases.len() >= self.capacity {
            let oldest = leases
                .iter()
                .min_by_key(|(_, lease)| lease.expires_at)
                .map(|(id, _)| *id);
            let Some(oldest) = oldest else { break };
            if let Some(lease) = leases.remove(&oldest) {
                warn!("Preview capacity reached; releasing {oldest}");
                lease.handle.release();
            }
        }

        leases.insert(
            id,
            Lease {
                handle,
                expires_at: now + self.ttl,
            },
        );
        id
    }

    pub fn release(&self, id: &Uuid) -> bool {
        let lease = self.leases().remove(id);
        match lease {
            Some(lease) => {
                lease.handle.release();
                true
            }
            None => false,
        }
    }

    /// Releases every expired lease, returning how many were released.
    pub fn sweep_expired(&self) -> usize {
        sweep(&mut self.leases(), Utc::now())
    }

    pub fn len(&self) -> usize {
        self.leases().len()
    }

    fn leases(&self) -> MutexGuard<'_, HashMap<Uuid, Lease>> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sweep(leases: &mut HashMap<Uuid, Lease>, now: DateTime<Utc>) -> usize {
    let expired: Vec<Uuid> = leases
        .iter()
        .filter(|(_, lease)| lease.expires_at <= now)
        .map(|(id, _)| *id)
        .collect();
    for id in &expired {
        if let Some(lease) = leases.remove(id) {
            debug!("Preview {id} expired");
            lease.handle.release();
        }
    }
    expired.len()
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub id: Uuid,
    pub url: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub size: usize,
}

/// POST /api/v1/previews
pub async fn handle_create_preview(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PreviewResponse>), AppError> {
    let mut form = read_upload_form(multipart, state.config.max_upload_bytes).await?;
    let scale = match form.optional("scale") {
        Some(raw) => raw
            .parse::<f32>()
            .map_err(|_| AppError::Validation(format!("Invalid scale '{raw}'")))?,
        None => state.rasterizer.options().default_scale,
    };
    let page = match form.optional("page") {
        Some(raw) => raw
            .parse::<NonZeroU16>()
            .map_err(|_| AppError::Validation(format!("Invalid page '{raw}'")))?,
        None => FIRST_PAGE,
    };
    let file = form.take_file()?;

    let converted = state
        .rasterizer
        .convert(ConversionRequest { file, page, scale })
        .await?;

    let response = PreviewResponse {
        id: converted.handle.id(),
        url: converted.handle.as_str().to_string(),
        name: converted.derived_name,
        width: converted.width,
        height: converted.height,
        size: converted.raster.size(),
    };
    state.previews.hold(converted.handle);
    info!(
        "Preview {} ready at {} ({} held)",
        response.id,
        response.url,
        state.previews.len()
    );

    Ok((StatusCode::CREATED, Json(response)))
}

/// DELETE /api/v1/previews/:id
pub async fn handle_release_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.previews.release(&id) {
        return Err(AppError::NotFound(format!("Preview {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /objects/:id
pub async fn handle_get_object(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.previews.sweep_expired();
    let blob = state
        .rasterizer
        .objects()
        .resolve(&id)
        .ok_or_else(|| AppError::NotFound(format!("Object {id} not found")))?;
    Ok(blob_response(blob))
}
