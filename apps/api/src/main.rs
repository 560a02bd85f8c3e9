mod config;
mod errors;
mod feedback;
mod kv;
mod llm_client;
mod models;
mod previews;
mod raster;
mod resumes;
mod routes;
mod session;
mod state;
mod storage;
mod upload;

#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::{Config, S3Config};
use crate::feedback::LlmFeedbackProvider;
use crate::kv::{KvStore, MemoryKvStore, RedisKvStore};
use crate::llm_client::LlmClient;
use crate::previews::PreviewLeases;
use crate::raster::pdfium::PdfiumFactory;
use crate::raster::{EngineLoader, ObjectUrlRegistry, Rasterizer};
use crate::routes::build_router;
use crate::session::KvSessions;
use crate::state::AppState;
use crate::storage::{BlobStore, LocalBlobStore, S3BlobStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resumind API v{}", env!("CARGO_PKG_VERSION"));

    // Metadata store: Redis when configured, in-memory otherwise
    let kv: Arc<dyn KvStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            let store = RedisKvStore::connect(&client).await?;
            info!("Redis KV store connected");
            Arc::new(store)
        }
        None => {
            info!("REDIS_URL not set; using in-memory KV store");
            Arc::new(MemoryKvStore::new())
        }
    };

    // Blob store: S3 / MinIO when configured, local directory otherwise
    let blobs: Arc<dyn BlobStore> = match &config.s3 {
        Some(s3) => {
            let client = build_s3_client(s3).await;
            info!("S3 client initialized (bucket: {})", s3.bucket);
            Arc::new(S3BlobStore::new(client, s3.bucket.clone()))
        }
        None => {
            info!("S3_BUCKET not set; storing blobs under {}", config.blob_dir.display());
            Arc::new(LocalBlobStore::new(config.blob_dir.clone()))
        }
    };

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let feedback = Arc::new(LlmFeedbackProvider::new(llm, blobs.clone()));

    // The PDF engine is loaded on the first conversion, not here
    let loader = EngineLoader::new(Arc::new(PdfiumFactory::new(
        config.pdfium_library_path.clone(),
    )));
    let rasterizer = Rasterizer::new(
        loader,
        ObjectUrlRegistry::new(config.public_base_url.clone()),
        config.raster_options(),
    );
    info!(
        "Rasterizer ready (scale {}, {:?})",
        config.render_scale, config.image_format
    );

    let sessions = KvSessions::new(
        kv.clone(),
        config.access_keys.clone(),
        chrono::Duration::seconds(config.session_ttl_secs),
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        rasterizer: Arc::new(rasterizer),
        blobs,
        kv,
        sessions: Arc::new(sessions),
        feedback,
        previews: Arc::new(PreviewLeases::new(
            chrono::Duration::seconds(config.preview_ttl_secs),
            config.max_previews,
        )),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to PUBLIC_BASE_URL once the web client is served from it

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &S3Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        "resumind-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.endpoint)
        .load()
        .await;

    // MinIO serves buckets on the path, not as subdomains
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
