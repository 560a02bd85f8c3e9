//! Memory-backed object URLs.
//!
//! Creating an [`ObjectUrl`] pins a blob in the registry until the handle is
//! released. `release` consumes the handle, so a handle can only be released
//! once; a handle that is dropped instead is revoked and reported as a leak.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::blob::Blob;

pub const OBJECTS_PATH: &str = "/objects";

pub struct ObjectUrlRegistry {
    origin: String,
    entries: Mutex<HashMap<Uuid, Blob>>,
}

impl ObjectUrlRegistry {
    /// `origin` is the externally visible base URL, e.g. `http://localhost:8080`.
    pub fn new(origin: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn create(self: &Arc<Self>, blob: Blob) -> ObjectUrl {
        let id = Uuid::new_v4();
        let url = format!("{}{}/{}", self.origin, OBJECTS_PATH, id);
        debug!("Created object URL {url} ({} bytes)", blob.size());
        self.entries().insert(id, blob);
        ObjectUrl {
            id,
            url,
            registry: Arc::clone(self),
            released: false,
        }
    }

    pub fn resolve(&self, id: &Uuid) -> Option<Blob> {
        self.entries().get(id).cloned()
    }

    /// Resolves a full URL previously handed out by this registry.
    pub fn resolve_url(&self, url: &str) -> Option<Blob> {
        let id = url
            .strip_prefix(&self.origin)?
            .strip_prefix(OBJECTS_PATH)?
            .strip_prefix('/')?;
        self.resolve(&Uuid::parse_str(id).ok()?)
    }

    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    fn revoke(&self, id: &Uuid) -> bool {
        self.entries().remove(id).is_some()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, Blob>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped handle to a blob held by an [`ObjectUrlRegistry`].
#[derive(Debug)]
pub struct ObjectUrl {
    id: Uuid,
    url: String,
    registry: Arc<ObjectUrlRegistry>,
    released: bool,
}

impl ObjectUrl {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Releases the underlying blob.
    pub fn release(mut self) {
        self.registry.revoke(&self.id);
        self.released = true;
        debug!("Released object URL {}", self.url);
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        if !self.released && self.registry.revoke(&self.id) {
            warn!("Object URL {} dropped without release; revoked", self.url);
        }
    }
}

impl std::fmt::Debug for ObjectUrlRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectUrlRegistry")
            .field("origin", &self.origin)
            .field("live", &self.live_count())
            .finish()
    }
}
