//! In-memory fakes shared by unit tests.

use std::collections::HashMap;
use std::num::NonZeroU16;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgba, RgbaImage};

use crate::config::Config;
use crate::feedback::{FeedbackContent, FeedbackError, FeedbackMessage, FeedbackProvider};
use crate::kv::MemoryKvStore;
use crate::models::blob::Blob;
use crate::previews::PreviewLeases;
use crate::raster::{
    ConversionError, ConversionStage, EngineFactory, EngineLoader, ObjectUrlRegistry, PageSize,
    RasterOptions, Rasterizer, RenderEngine, RenderPlan,
};
use crate::session::KvSessions;
use crate::state::AppState;
use crate::storage::{validate_path, BlobStore, StorageError};

pub const LETTER: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

pub const TEST_ORIGIN: &str = "http://localhost:8080";
pub const TEST_ACCESS_KEY: &str = "test-access-key";

pub const SAMPLE_FEEDBACK: &str = r#"{
  "overallScore": 78,
  "ATS": {
    "score": 72,
    "tips": [
      { "type": "good", "tip": "Standard section headings" },
      { "type": "improve", "tip": "Add keywords from the posting" }
    ]
  },
  "toneAndStyle": {
    "score": 80,
    "tips": [{ "type": "good", "tip": "Confident voice", "explanation": "Bullets open with strong verbs." }]
  },
  "content": {
    "score": 75,
    "tips": [{ "type": "improve", "tip": "Quantify impact", "explanation": "Most bullets lack numbers." }]
  },
  "structure": {
    "score": 85,
    "tips": [{ "type": "good", "tip": "Clean layout", "explanation": "One column, consistent spacing." }]
  },
  "skills": {
    "score": 70,
    "tips": [{ "type": "improve", "tip": "List Rust tooling", "explanation": "The posting asks for tokio and axum." }]
  }
}"#;

/// Smallest byte sequence the fake engine accepts as a PDF.
pub fn fake_pdf() -> Bytes {
    Bytes::from_static(b"%PDF-1.7\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n")
}

/// Parses anything starting with `%PDF-` and renders white pages.
pub struct FakeEngine {
    pages: Vec<PageSize>,
    fail_render: bool,
}

impl FakeEngine {
    fn parse(&self, document: &[u8]) -> Result<(), ConversionError> {
        if document.starts_with(b"%PDF-") {
            Ok(())
        } else {
            Err(ConversionError::Parse("missing %PDF header".to_string()))
        }
    }

    fn page(&self, page: NonZeroU16) -> Result<PageSize, ConversionError> {
        self.pages
            .get(usize::from(page.get()) - 1)
            .copied()
            .ok_or(ConversionError::PageNotFound {
                requested: page.get(),
                available: self.pages.len() as u16,
            })
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn rasterize(
        &self,
        document: Bytes,
        page: NonZeroU16,
        plan: RenderPlan,
    ) -> Result<RgbaImage, ConversionError> {
        self.parse(&document)?;
        ConversionStage::Parsed.trace();
        let size = self.page(page)?;
        ConversionStage::PageFetched.trace();
        let viewport = plan.viewport_for(size)?;
        if self.fail_render {
            return Err(ConversionError::Render("fake render failure".to_string()));
        }
        Ok(RgbaImage::from_pixel(
            viewport.width,
            viewport.height,
            Rgba([255, 255, 255, 255]),
        ))
    }
}

/// Counts loads; can be slowed down or made to fail the first N loads.
pub struct FakeEngineFactory {
    loads: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Duration,
    pages: Vec<PageSize>,
    fail_render: bool,
}

impl Default for FakeEngineFactory {
    fn default() -> Self {
        Self {
            loads: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            delay: Duration::ZERO,
            pages: vec![LETTER],
            fail_render: false,
        }
    }
}

impl FakeEngineFactory {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_first(self, failures: usize) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    pub fn with_pages(mut self, pages: Vec<PageSize>) -> Self {
        self.pages = pages;
        self
    }

    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineFactory for FakeEngineFactory {
    async fn load(&self) -> Result<Arc<dyn RenderEngine>, ConversionError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ConversionError::EngineLoad("fake load failure".to_string()));
        }
        Ok(Arc::new(FakeEngine {
            pages: self.pages.clone(),
            fail_render: self.fail_render,
        }))
    }
}

pub fn rasterizer_with(factory: FakeEngineFactory) -> (Rasterizer, Arc<FakeEngineFactory>) {
    let factory = Arc::new(factory);
    let rasterizer = Rasterizer::new(
        EngineLoader::new(factory.clone()),
        ObjectUrlRegistry::new(TEST_ORIGIN),
        RasterOptions::default(),
    );
    (rasterizer, factory)
}

/// Blob store backed by a map; paths are validated like the real stores.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Blob>>,
}

impl MemoryBlobStore {
    pub fn get(&self, path: &str) -> Option<Blob> {
        self.blobs.lock().unwrap().get(path).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, path: &str) -> Result<Option<Blob>, StorageError> {
        validate_path(path)?;
        Ok(self.get(path))
    }

    async fn upload(&self, path: &str, blob: Blob) -> Result<(), StorageError> {
        validate_path(path)?;
        self.blobs.lock().unwrap().insert(path.to_string(), blob);
        Ok(())
    }
}

/// Records every request and answers with a canned reply.
pub struct ScriptedFeedback {
    reply: Mutex<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl Default for ScriptedFeedback {
    fn default() -> Self {
        Self {
            reply: Mutex::new(SAMPLE_FEEDBACK.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedFeedback {
    pub fn reply_with(&self, reply: &str) {
        *self.reply.lock().unwrap() = reply.to_string();
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackProvider for ScriptedFeedback {
    async fn feedback(
        &self,
        document_path: &str,
        instructions: &str,
    ) -> Result<FeedbackMessage, FeedbackError> {
        self.calls
            .lock()
            .unwrap()
            .push((document_path.to_string(), instructions.to_string()));
        Ok(FeedbackMessage {
            message: FeedbackContent {
                content: self.reply.lock().unwrap().clone(),
            },
        })
    }
}

pub struct TestState {
    pub state: AppState,
    pub blobs: Arc<MemoryBlobStore>,
    pub feedback: Arc<ScriptedFeedback>,
    pub engine: Arc<FakeEngineFactory>,
}

/// Full application state wired to in-memory fakes.
pub fn test_state() -> TestState {
    let config = Config::for_tests();
    let engine = Arc::new(FakeEngineFactory::default());
    let rasterizer = Rasterizer::new(
        EngineLoader::new(engine.clone()),
        ObjectUrlRegistry::new(config.public_base_url.clone()),
        config.raster_options(),
    );
    let blobs = Arc::new(MemoryBlobStore::default());
    let feedback = Arc::new(ScriptedFeedback::default());
    let kv = Arc::new(MemoryKvStore::new());
    let sessions = KvSessions::new(
        kv.clone(),
        config.access_keys.clone(),
        chrono::Duration::seconds(config.session_ttl_secs),
    );

    let previews = PreviewLeases::new(
        chrono::Duration::seconds(config.preview_ttl_secs),
        config.max_previews,
    );

    let state = AppState {
        config,
        rasterizer: Arc::new(rasterizer),
        blobs: blobs.clone(),
        kv,
        sessions: Arc::new(sessions),
        feedback: feedback.clone(),
        previews: Arc::new(previews),
    };

    TestState {
        state,
        blobs,
        feedback,
        engine,
    }
}
