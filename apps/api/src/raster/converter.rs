use std::num::NonZeroU16;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::encode::{encode_surface, EncodeOptions, ImageFormat};
use super::engine::{EngineLoader, RenderPlan};
use super::error::{ConversionError, ConversionStage};
use super::object_url::{ObjectUrl, ObjectUrlRegistry};
use crate::models::blob::{Blob, PDF_MIME};

pub const DEFAULT_SCALE: f32 = 2.0;
/// Largest accepted render scale (576 dpi).
pub const MAX_SCALE: f32 = 8.0;
pub const FIRST_PAGE: NonZeroU16 = NonZeroU16::MIN;

/// A PDF file as received from a caller.
#[derive(Debug, Clone)]
pub struct PdfFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl PdfFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// PDF by declared content type or by a case-insensitive `.pdf` suffix.
    pub fn looks_like_pdf(&self) -> bool {
        let declared = self
            .content_type
            .as_deref()
            .map(|ct| ct.eq_ignore_ascii_case(PDF_MIME))
            .unwrap_or(false);
        declared || has_pdf_suffix(&self.name)
    }

    /// Checks that the file is non-empty and declared or named as a PDF.
    pub fn validate(&self) -> Result<(), ConversionError> {
        if self.bytes.is_empty() {
            return Err(ConversionError::InvalidInput("empty file".to_string()));
        }
        if !self.looks_like_pdf() {
            return Err(ConversionError::InvalidInput("not a PDF".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub file: PdfFile,
    /// 1-based page number.
    pub page: NonZeroU16,
    /// Output pixels per PDF point.
    pub scale: f32,
}

impl ConversionRequest {
    pub fn first_page(file: PdfFile, scale: f32) -> Self {
        Self {
            file,
            page: FIRST_PAGE,
            scale,
        }
    }
}

/// A successfully rasterized page. Owns the URL handle; callers must release it.
#[derive(Debug)]
pub struct ConvertedImage {
    pub raster: Blob,
    pub handle: ObjectUrl,
    pub derived_name: String,
    pub width: u32,
    pub height: u32,
}

pub type ConversionResult = Result<ConvertedImage, ConversionError>;

#[derive(Debug, Clone, Copy)]
pub struct RasterOptions {
    pub default_scale: f32,
    pub encode: EncodeOptions,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            default_scale: DEFAULT_SCALE,
            encode: EncodeOptions::default(),
        }
    }
}

/// Converts PDF pages into raster images.
pub struct Rasterizer {
    loader: EngineLoader,
    objects: Arc<ObjectUrlRegistry>,
    options: RasterOptions,
}

impl Rasterizer {
    pub fn new(loader: EngineLoader, objects: Arc<ObjectUrlRegistry>, options: RasterOptions) -> Self {
        Self {
            loader,
            objects,
            options,
        }
    }

    pub fn objects(&self) -> &Arc<ObjectUrlRegistry> {
        &self.objects
    }

    pub fn options(&self) -> RasterOptions {
        self.options
    }

    pub fn engine_loaded(&self) -> bool {
        self.loader.is_loaded()
    }

    /// Renders the first page of `file` at the configured default scale.
    pub async fn convert_pdf_to_image(&self, file: PdfFile) -> ConversionResult {
        self.convert(ConversionRequest::first_page(file, self.options.default_scale))
            .await
    }

    pub async fn convert(&self, request: ConversionRequest) -> ConversionResult {
        info!(
            "Starting PDF to image conversion for {} ({} bytes)",
            request.file.name,
            request.file.size()
        );
        match self.run(request).await {
            Ok(converted) => {
                info!(
                    "Converted to {} ({}x{}, {} bytes)",
                    converted.derived_name,
                    converted.width,
                    converted.height,
                    converted.raster.size()
                );
                Ok(converted)
            }
            Err(e) => {
                warn!(stage = ?e.stage(), retryable = e.is_retryable(), "{}", e.reason());
                Err(e)
            }
        }
    }

    async fn run(&self, request: ConversionRequest) -> ConversionResult {
        let ConversionRequest { file, page, scale } = request;
        validate(&file, scale)?;

        let engine = self.loader.acquire().await?;
        ConversionStage::EngineReady.trace();

        let plan = RenderPlan::new(scale);
        debug!("Rendering page {page} at scale {scale}");
        let surface = engine.rasterize(file.bytes.clone(), page, plan).await?;
        ConversionStage::Rendered.trace();

        let (width, height) = surface.dimensions();
        let encode = self.options.encode;
        let encoded = tokio::task::spawn_blocking(move || encode_surface(&surface, encode))
            .await
            .map_err(|e| ConversionError::Encode(format!("encoder task failed: {e}")))??;
        ConversionStage::Encoded.trace();

        let raster = Blob::new(encoded, encode.format.mime_type());
        let handle = self.objects.create(raster.clone());
        ConversionStage::Done.trace();

        Ok(ConvertedImage {
            raster,
            handle,
            derived_name: derive_output_name(&file.name, encode.format),
            width,
            height,
        })
    }
}

fn validate(file: &PdfFile, scale: f32) -> Result<(), ConversionError> {
    file.validate()?;
    if !scale.is_finite() || scale <= 0.0 || scale > MAX_SCALE {
        return Err(ConversionError::InvalidInput(format!(
            "scale must be greater than 0 and at most {MAX_SCALE}, got {scale}"
        )));
    }
    Ok(())
}

fn has_pdf_suffix(name: &str) -> bool {
    name.len() >= 4
        && name
            .get(name.len() - 4..)
            .map(|suffix| suffix.eq_ignore_ascii_case(".pdf"))
            .unwrap_or(false)
}

/// `Resume.PDF` -> `Resume.png`; `notes` -> `notes.png`.
pub fn derive_output_name(name: &str, format: ImageFormat) -> String {
    let stem = if has_pdf_suffix(name) {
        &name[..name.len() - 4]
    } else {
        name
    };
    format!("{stem}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::engine::PageSize;
    use crate::testing::{fake_pdf, rasterizer_with, FakeEngineFactory};
    use std::time::Duration;

    fn pdf_file(name: &str) -> PdfFile {
        PdfFile {
            name: name.to_string(),
            content_type: Some(PDF_MIME.to_string()),
            bytes: fake_pdf(),
        }
    }

    #[test]
    fn test_derive_output_name() {
        assert_eq!(derive_output_name("Resume.PDF", ImageFormat::Png), "Resume.png");
        assert_eq!(derive_output_name("notes", ImageFormat::Png), "notes.png");
        assert_eq!(derive_output_name("cv.pdf.pdf", ImageFormat::Png), "cv.pdf.png");
        assert_eq!(derive_output_name("scan.pdf", ImageFormat::Jpeg), "scan.jpg");
        assert_eq!(derive_output_name(".pdf", ImageFormat::Png), ".png");
    }

    #[test]
    fn test_pdf_detection() {
        let mut file = pdf_file("resume.bin");
        assert!(file.looks_like_pdf());

        file.content_type = Some("text/plain".to_string());
        assert!(!file.looks_like_pdf());

        file.name = "RESUME.Pdf".to_string();
        assert!(file.looks_like_pdf());

        file.name = "ré.pdf".to_string();
        file.content_type = None;
        assert!(file.looks_like_pdf());
    }

    #[tokio::test]
    async fn test_convert_success_handle_dereferences_raster() {
        let (rasterizer, _factory) = rasterizer_with(FakeEngineFactory::default());

        let converted = rasterizer
            .convert_pdf_to_image(pdf_file("Resume.PDF"))
            .await
            .unwrap();

        assert!(converted.raster.size() > 0);
        assert_eq!(converted.raster.content_type, "image/png");
        assert_eq!(converted.derived_name, "Resume.png");
        assert_eq!((converted.width, converted.height), (1224, 1584));

        let resolved = rasterizer
            .objects()
            .resolve_url(converted.handle.as_str())
            .unwrap();
        assert_eq!(resolved.bytes, converted.raster.bytes);

        converted.handle.release();
        assert_eq!(rasterizer.objects().live_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_file_rejected_regardless_of_type() {
        let (rasterizer, factory) = rasterizer_with(FakeEngineFactory::default());
        let file = PdfFile {
            bytes: Bytes::new(),
            ..pdf_file("resume.pdf")
        };

        let err = rasterizer.convert_pdf_to_image(file).await.unwrap_err();
        assert_eq!(err, ConversionError::InvalidInput("empty file".to_string()));
        assert!(err.reason().contains("empty file"));
        assert_eq!(factory.load_count(), 0);
    }

    #[tokio::test]
    async fn test_non_pdf_rejected_before_engine_load() {
        let (rasterizer, factory) = rasterizer_with(FakeEngineFactory::default());
        let file = PdfFile {
            name: "resume.docx".to_string(),
            content_type: Some("application/msword".to_string()),
            bytes: fake_pdf(),
        };

        let err = rasterizer.convert_pdf_to_image(file).await.unwrap_err();
        assert_eq!(err, ConversionError::InvalidInput("not a PDF".to_string()));
        assert_eq!(factory.load_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_scale_rejected() {
        let (rasterizer, factory) = rasterizer_with(FakeEngineFactory::default());
        for scale in [0.0, -1.0, f32::NAN, f32::INFINITY, MAX_SCALE + 0.5, 50.0, 1e12] {
            let request = ConversionRequest::first_page(pdf_file("a.pdf"), scale);
            let err = rasterizer.convert(request).await.unwrap_err();
            assert!(matches!(err, ConversionError::InvalidInput(_)));
        }
        assert_eq!(factory.load_count(), 0);
        assert_eq!(rasterizer.objects().live_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_page_rejected_before_render() {
        let poster = PageSize {
            width: 6000.0,
            height: 6000.0,
        };
        let (rasterizer, _factory) =
            rasterizer_with(FakeEngineFactory::default().with_pages(vec![poster]));

        let err = rasterizer
            .convert_pdf_to_image(pdf_file("poster.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidInput(_)));
        assert!(err.reason().contains("pixel limit"));
        assert_eq!(rasterizer.objects().live_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_document_is_parse_error() {
        let (rasterizer, _factory) = rasterizer_with(FakeEngineFactory::default());
        let file = PdfFile {
            bytes: Bytes::from_static(b"definitely not a pdf"),
            ..pdf_file("broken.pdf")
        };

        let err = rasterizer.convert_pdf_to_image(file).await.unwrap_err();
        assert!(matches!(err, ConversionError::Parse(_)));
        assert_eq!(rasterizer.objects().live_count(), 0);
    }

    #[tokio::test]
    async fn test_page_beyond_count_yields_page_not_found() {
        let (rasterizer, _factory) = rasterizer_with(FakeEngineFactory::default());
        let request = ConversionRequest {
            file: pdf_file("resume.pdf"),
            page: NonZeroU16::new(2).unwrap(),
            scale: DEFAULT_SCALE,
        };

        let err = rasterizer.convert(request).await.unwrap_err();
        assert_eq!(
            err,
            ConversionError::PageNotFound {
                requested: 2,
                available: 1
            }
        );
        assert!(err.reason().contains("not found"));
        assert_eq!(rasterizer.objects().live_count(), 0);
    }

    #[tokio::test]
    async fn test_render_failure_is_reported() {
        let (rasterizer, _factory) =
            rasterizer_with(FakeEngineFactory::default().failing_render());

        let err = rasterizer
            .convert_pdf_to_image(pdf_file("resume.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Render(_)));
        assert_eq!(err.stage(), ConversionStage::PageFetched);
    }

    #[tokio::test]
    async fn test_engine_load_failure_then_retry() {
        let (rasterizer, factory) = rasterizer_with(FakeEngineFactory::default().failing_first(1));

        let err = rasterizer
            .convert_pdf_to_image(pdf_file("resume.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::EngineLoad(_)));

        let converted = rasterizer
            .convert_pdf_to_image(pdf_file("resume.pdf"))
            .await
            .unwrap();
        converted.handle.release();
        assert_eq!(factory.load_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_conversions_share_one_engine_load() {
        let (rasterizer, factory) =
            rasterizer_with(FakeEngineFactory::default().with_delay(Duration::from_millis(50)));
        let rasterizer = Arc::new(rasterizer);

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let rasterizer = Arc::clone(&rasterizer);
                tokio::spawn(async move {
                    rasterizer
                        .convert_pdf_to_image(pdf_file(&format!("resume-{i}.pdf")))
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap().handle.release();
        }
        assert_eq!(factory.load_count(), 1);
        assert_eq!(rasterizer.objects().live_count(), 0);
    }

    #[tokio::test]
    async fn test_larger_scale_gives_larger_raster() {
        let (rasterizer, _factory) = rasterizer_with(FakeEngineFactory::default());

        let mut last = (0, 0);
        for scale in [0.5, 1.0, 1.5, 2.0, 3.0] {
            let request = ConversionRequest::first_page(pdf_file("resume.pdf"), scale);
            let converted = rasterizer.convert(request).await.unwrap();
            assert!(converted.width > last.0);
            assert!(converted.height > last.1);
            last = (converted.width, converted.height);
            converted.handle.release();
        }
    }
}
