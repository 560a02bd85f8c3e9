//! PDF to raster image conversion.
//!
//! - `engine`: rendering-engine seam and single-flight loader
//! - `pdfium`: PDFium-backed engine running on its own worker thread
//! - `encode`: PNG/JPEG encoding of rendered surfaces
//! - `object_url`: scoped, explicitly released blob URLs
//! - `converter`: the `Rasterizer` tying the stages together

pub mod converter;
pub mod encode;
pub mod engine;
pub mod error;
pub mod object_url;
pub mod pdfium;

pub use converter::{
    derive_output_name, ConversionRequest, ConversionResult, ConvertedImage, PdfFile,
    RasterOptions, Rasterizer, DEFAULT_SCALE, MAX_SCALE,
};
pub use encode::{EncodeOptions, ImageFormat};
pub use engine::{
    EngineFactory, EngineLoader, PageSize, RenderEngine, RenderPlan, Viewport, MAX_RASTER_PIXELS,
};
pub use error::{ConversionError, ConversionStage};
pub use object_url::{ObjectUrl, ObjectUrlRegistry};
