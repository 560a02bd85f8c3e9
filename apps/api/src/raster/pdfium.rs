//! PDFium-backed rendering engine.
//!
//! `Pdfium` is neither `Send` nor `Sync`, so the engine owns it on a single
//! dedicated worker thread for the lifetime of the process. Async callers
//! send jobs over a channel and wait for the answer on a oneshot.

use std::num::NonZeroU16;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbaImage;
use pdfium_render::prelude::*;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::engine::{EngineFactory, PageSize, RenderEngine, RenderPlan};
use super::error::{ConversionError, ConversionStage};

const WORKER_THREAD_NAME: &str = "pdfium-worker";

type Reply<T> = oneshot::Sender<Result<T, ConversionError>>;

struct Job {
    document: Bytes,
    page: NonZeroU16,
    plan: RenderPlan,
    reply: Reply<RgbaImage>,
}

/// Loads PDFium and starts its worker thread.
pub struct PdfiumFactory {
    library_path: Option<PathBuf>,
}

impl PdfiumFactory {
    /// `library_path` may point at the shared library itself or at the directory holding it.
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }
}

#[async_trait]
impl EngineFactory for PdfiumFactory {
    async fn load(&self) -> Result<Arc<dyn RenderEngine>, ConversionError> {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let library_path = self.library_path.clone();

        std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let pdfium = match bind_pdfium(library_path.as_deref()) {
                    Ok(pdfium) => pdfium,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                run_worker(&pdfium, jobs_rx);
            })
            .map_err(|e| ConversionError::EngineLoad(format!("failed to spawn worker: {e}")))?;

        ready_rx.await.map_err(|_| {
            ConversionError::EngineLoad("worker exited before PDFium was bound".to_string())
        })??;

        Ok(Arc::new(PdfiumEngine { jobs: jobs_tx }))
    }
}

/// Handle to the PDFium worker thread.
pub struct PdfiumEngine {
    jobs: mpsc::UnboundedSender<Job>,
}

#[async_trait]
impl RenderEngine for PdfiumEngine {
    async fn rasterize(
        &self,
        document: Bytes,
        page: NonZeroU16,
        plan: RenderPlan,
    ) -> Result<RgbaImage, ConversionError> {
        let (reply, answer) = oneshot::channel();
        self.jobs
            .send(Job {
                document,
                page,
                plan,
                reply,
            })
            .map_err(|_| ConversionError::Render("PDFium worker is not running".to_string()))?;
        answer
            .await
            .map_err(|_| ConversionError::Render("PDFium worker dropped the job".to_string()))?
    }
}

fn run_worker(pdfium: &Pdfium, mut jobs: mpsc::UnboundedReceiver<Job>) {
    debug!("PDFium worker started");
    while let Some(job) = jobs.blocking_recv() {
        let result = rasterize(pdfium, &job.document, job.page, job.plan);
        let _ = job.reply.send(result);
    }
    debug!("PDFium worker stopped");
}

fn rasterize(
    pdfium: &Pdfium,
    bytes: &[u8],
    page: NonZeroU16,
    plan: RenderPlan,
) -> Result<RgbaImage, ConversionError> {
    let doc = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ConversionError::Parse(e.to_string()))?;
    ConversionStage::Parsed.trace();

    let available = doc.pages().len() as u16;
    if page.get() > available {
        return Err(ConversionError::PageNotFound {
            requested: page.get(),
            available,
        });
    }
    let pdf_page = doc
        .pages()
        .get(page.get() - 1)
        .map_err(|e| ConversionError::Parse(e.to_string()))?;
    ConversionStage::PageFetched.trace();

    let size = PageSize {
        width: pdf_page.width().value,
        height: pdf_page.height().value,
    };
    let viewport = plan.viewport_for(size)?;
    let target = |pixels: u32| {
        i32::try_from(pixels).map_err(|_| {
            ConversionError::InvalidInput(format!("target size {pixels}px is out of range"))
        })
    };

    let config = PdfRenderConfig::new()
        .set_target_width(target(viewport.width)?)
        .set_target_height(target(viewport.height)?)
        .set_text_smoothing(true)
        .set_image_smoothing(true)
        .set_path_smoothing(true)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = pdf_page
        .render_with_config(&config)
        .map_err(|e| ConversionError::Render(e.to_string()))?;

    let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
    RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
        ConversionError::Render(format!(
            "bitmap buffer does not match {width}x{height} pixels"
        ))
    })
}

/// Binds to the PDFium shared library, trying in order:
/// the configured path, the executable's directory, then the system library.
fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, ConversionError> {
    if let Some(path) = library_path {
        let candidate = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(path)
        } else {
            path.to_path_buf()
        };
        return Pdfium::bind_to_library(&candidate)
            .map(|bindings| {
                info!("Loaded PDFium from {}", candidate.display());
                Pdfium::new(bindings)
            })
            .map_err(|e| {
                ConversionError::EngineLoad(format!(
                    "could not load PDFium from {}: {e}",
                    candidate.display()
                ))
            });
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let bundled = Pdfium::pdfium_platform_library_name_at_path(&exe_dir);
        if bundled.exists() {
            if let Ok(bindings) = Pdfium::bind_to_library(&bundled) {
                info!("Loaded bundled PDFium from {}", bundled.display());
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    Pdfium::bind_to_system_library()
        .map(|bindings| {
            info!("Loaded system PDFium library");
            Pdfium::new(bindings)
        })
        .map_err(|e| {
            ConversionError::EngineLoad(format!(
                "could not load PDFium; set PDFIUM_LIBRARY_PATH ({e})"
            ))
        })
}
