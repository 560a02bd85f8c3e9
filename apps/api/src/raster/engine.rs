//! Rendering-engine seam and the single-flight loader that owns the engine.
//!
//! The engine is whatever turns PDF bytes into pixels. The loader makes sure
//! at most one engine is ever brought up, no matter how many conversions race
//! to be first.

use std::num::NonZeroU16;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbaImage;
use tokio::sync::watch;
use tracing::{info, warn};

use super::error::ConversionError;

/// Page dimensions in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Pixel dimensions of a page rendered at a given scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Scales page points linearly, rounding down to whole pixels (never below 1x1).
    pub fn at_scale(page: PageSize, scale: f32) -> Self {
        let to_pixels = |points: f32| (points * scale).floor().max(1.0) as u32;
        Self {
            width: to_pixels(page.width),
            height: to_pixels(page.height),
        }
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Upper bound on rendered pixels per page; 40M RGBA pixels is 160 MB.
pub const MAX_RASTER_PIXELS: u64 = 40_000_000;

/// Sizing for one page render: scale factor plus the pixel budget it must fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPlan {
    pub scale: f32,
    pub max_pixels: u64,
}

impl RenderPlan {
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            max_pixels: MAX_RASTER_PIXELS,
        }
    }

    pub fn viewport_for(&self, page: PageSize) -> Result<Viewport, ConversionError> {
        let viewport = Viewport::at_scale(page, self.scale);
        if viewport.pixel_count() > self.max_pixels {
            return Err(ConversionError::InvalidInput(format!(
                "page renders to {}x{} pixels at scale {}, over the {} pixel limit",
                viewport.width, viewport.height, self.scale, self.max_pixels
            )));
        }
        Ok(viewport)
    }
}

/// A loaded PDF rendering engine. Pages are 1-based.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Parses `document` once, sizes `page` with `plan` and renders it onto an
    /// RGBA surface of exactly the planned viewport.
    async fn rasterize(
        &self,
        document: Bytes,
        page: NonZeroU16,
        plan: RenderPlan,
    ) -> Result<RgbaImage, ConversionError>;
}

/// Brings up a rendering engine. Called at most once per successful load.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn RenderEngine>, ConversionError>;
}

type LoadOutcome = Option<Result<Arc<dyn RenderEngine>, ConversionError>>;

enum EngineSlot {
    Empty,
    Loading(watch::Receiver<LoadOutcome>),
    Ready(Arc<dyn RenderEngine>),
}

enum Join {
    Ready(Arc<dyn RenderEngine>),
    Wait(watch::Receiver<LoadOutcome>),
}

/// Lazily loads the engine on first use and shares it afterwards.
///
/// Every caller that arrives while a load is in flight waits for that same
/// load and receives its outcome, success or failure. A failed load empties
/// the slot so the next caller starts a fresh attempt; a successful load is
/// kept for the lifetime of the loader.
pub struct EngineLoader {
    factory: Arc<dyn EngineFactory>,
    slot: Arc<Mutex<EngineSlot>>,
}

impl EngineLoader {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            slot: Arc::new(Mutex::new(EngineSlot::Empty)),
        }
    }

    pub async fn acquire(&self) -> Result<Arc<dyn RenderEngine>, ConversionError> {
        let mut outcome = match self.join() {
            Join::Ready(engine) => return Ok(engine),
            Join::Wait(outcome) => outcome,
        };

        let result = outcome
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|done| done.clone());
        result.unwrap_or_else(|| {
            Err(ConversionError::EngineLoad(
                "engine load was abandoned".to_string(),
            ))
        })
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*lock_slot(&self.slot), EngineSlot::Ready(_))
    }

    /// Returns the loaded engine, or a receiver for the in-flight load,
    /// starting one when there is none.
    fn join(&self) -> Join {
        let mut slot = lock_slot(&self.slot);
        match &*slot {
            EngineSlot::Ready(engine) => return Join::Ready(Arc::clone(engine)),
            // A closed channel means the loading task died without reporting.
            EngineSlot::Loading(outcome) if outcome.has_changed().is_ok() => {
                return Join::Wait(outcome.clone())
            }
            _ => {}
        }

        let (done, outcome) = watch::channel(None);
        *slot = EngineSlot::Loading(outcome.clone());
        self.start_load(done);
        Join::Wait(outcome)
    }

    fn start_load(&self, done: watch::Sender<LoadOutcome>) {
        let factory = Arc::clone(&self.factory);
        let slot = Arc::clone(&self.slot);
        tokio::spawn(async move {
            info!("Loading PDF rendering engine...");
            let result = factory.load().await;
            *lock_slot(&slot) = match &result {
                Ok(engine) => {
                    info!("PDF rendering engine ready");
                    EngineSlot::Ready(Arc::clone(engine))
                }
                Err(e) => {
                    warn!("PDF rendering engine failed to load: {e}");
                    EngineSlot::Empty
                }
            };
            let _ = done.send(Some(result));
        });
    }
}

fn lock_slot(slot: &Mutex<EngineSlot>) -> MutexGuard<'_, EngineSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
