mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod routes;
mod state;
mod storage;
mod video;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, S3Settings, StorageBackend};
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::{ChatModel, GroqClient, UnconfiguredModel};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{MemoryStore, ObjectStore, PgStore, RedisStore, Repository, Store};
use crate::video::{S3BlobStore, VideoStore};

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

    info!("Starting Interview Coach API v{}", env!("CARGO_PKG_VERSION"));

    info!("Connecting {} storage backend", config.storage_backend.as_str());
    let repo = Repository::new(build_store(&config).await?);

    // Initialize LLM client
    let llm: Arc<dyn ChatModel> = match &config.groq_api_key {
        Some(key) => {
            let client = GroqClient::new(key.clone())?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Arc::new(client)
        }
        None => {
            warn!("GROQ_API_KEY not set; AI endpoints will answer 503");
            Arc::new(UnconfiguredModel)
        }
    };

    let features = config.features;
    let videos = match (&config.s3, features.video_storage) {
        (Some(s3), true) => {
            let client = build_s3_client(s3).await;
            info!("Video storage enabled (bucket: {})", s3.bucket);
            Some(VideoStore::new(Arc::new(S3BlobStore::new(
                client,
                s3.bucket.clone(),
                &s3.endpoint,
            ))))
        }
        _ => None,
    };
    info!(
        "Feature flags: recording={} storage={} playback={}",
        features.video_recording, features.video_storage, features.video_playback
    );

    let state = AppState {
        repo,
        llm,
        videos,
        features,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Connects the configured persistence backend.
async fn build_store(config: &Config) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::default())
        }
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .context("REDIS_URL is required for the redis backend")?;
            let client = redis::Client::open(url)?;
            Arc::new(RedisStore::connect(&client).await?)
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .context("S3 settings are required for the s3 backend")?;
            let client = build_s3_client(s3).await;
            Arc::new(ObjectStore::new(client, s3.bucket.clone()))
        }
    };
    Ok(store)
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(s3: &S3Settings) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &s3.access_key_id,
        &s3.secret_access_key,
        None,
        None,
        "coach-static",
    );

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&s3.endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
