use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::raster::{EncodeOptions, ImageFormat, RasterOptions, DEFAULT_SCALE, MAX_SCALE};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 15 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;
const DEFAULT_PREVIEW_TTL_SECS: i64 = 15 * 60;
const DEFAULT_MAX_PREVIEWS: usize = 64;

/// S3 / MinIO settings. All four variables must be set together.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub public_base_url: String,
    pub access_keys: Vec<String>,
    /// In-memory KV store when unset.
    pub redis_url: Option<String>,
    /// Local blob directory when unset.
    pub s3: Option<S3Config>,
    pub blob_dir: PathBuf,
    pub anthropic_api_key: String,
    pub pdfium_library_path: Option<PathBuf>,
    pub render_scale: f32,
    pub image_format: ImageFormat,
    pub image_quality: f32,
    pub max_upload_bytes: usize,
    pub session_ttl_secs: i64,
    /// Unreleased previews are freed after this long.
    pub preview_ttl_secs: i64,
    pub max_previews: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let port: u16 = parse_env("PORT", 8080)?;

        let access_keys = parse_list(&require_env("ACCESS_KEYS")?);
        if access_keys.is_empty() {
            bail!("ACCESS_KEYS must contain at least one key");
        }

        let s3 = match optional_env("S3_BUCKET") {
            Some(bucket) => Some(S3Config {
                bucket,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            None => None,
        };

        let image_format = match optional_env("IMAGE_FORMAT") {
            Some(raw) => raw.parse::<ImageFormat>().map_err(anyhow::Error::msg)?,
            None => ImageFormat::Png,
        };

        Ok(Config {
            port,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            public_base_url: optional_env("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            access_keys,
            redis_url: optional_env("REDIS_URL"),
            s3,
            blob_dir: optional_env("BLOB_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            pdfium_library_path: optional_env("PDFIUM_LIBRARY_PATH").map(PathBuf::from),
            render_scale: validate_scale(parse_env("RENDER_SCALE", DEFAULT_SCALE)?)
                .context("RENDER_SCALE")?,
            image_format,
            image_quality: validate_quality(parse_env("IMAGE_QUALITY", 0.9)?)
                .context("IMAGE_QUALITY")?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            session_ttl_secs: parse_env("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            preview_ttl_secs: parse_env("PREVIEW_TTL_SECS", DEFAULT_PREVIEW_TTL_SECS)?,
            max_previews: parse_env("MAX_PREVIEWS", DEFAULT_MAX_PREVIEWS)?,
        })
    }

    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            default_scale: self.render_scale,
            encode: EncodeOptions {
                format: self.image_format,
                quality: self.image_quality,
            },
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    optional_env(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} is invalid ('{raw}'): {e}")),
        None => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn validate_scale(scale: f32) -> Result<f32> {
    if !scale.is_finite() || scale <= 0.0 || scale > MAX_SCALE {
        bail!("render scale must be greater than 0 and at most {MAX_SCALE}, got {scale}");
    }
    Ok(scale)
}

fn validate_quality(quality: f32) -> Result<f32> {
    if !(0.0..=1.0).contains(&quality) {
        bail!("image quality must be between 0 and 1, got {quality}");
    }
    Ok(quality)
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            port: 8080,
            rust_log: "debug".to_string(),
            public_base_url: crate::testing::TEST_ORIGIN.to_string(),
            access_keys: vec![crate::testing::TEST_ACCESS_KEY.to_string()],
            redis_url: None,
            s3: None,
            blob_dir: PathBuf::from("./data"),
            anthropic_api_key: "test-key".to_string(),
            pdfium_library_path: None,
            render_scale: DEFAULT_SCALE,
            image_format: ImageFormat::Png,
            image_quality: 0.9,
            max_upload_bytes: 1024,
            session_ttl_secs: 3600,
            preview_ttl_secs: 600,
            max_previews: 8,
        }
    }
}
