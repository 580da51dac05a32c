//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        tts::{
            edge::EdgeSocketBackend, translate::TranslateBatchBackend, volc::VolcSignedBackend,
        },
        CompletionClient, FileSnapshotStore, ShareCardComposer, SpeechSynthesizer,
    },
    config::Config,
    error::ApiError,
    web::{
        daily_handler, detect_language_handler, divine_image_handler, get_player_prefs_handler,
        put_player_prefs_handler, reading_handler, share_card_handler, state::AppState,
        synthesize_handler,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tarot_core::ports::SynthesisBackend;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let reading_adapter = Arc::new(CompletionClient::new(
        config.chat_api_url.clone(),
        config.chat_api_key.clone(),
        config.chat_model.clone(),
        config.mock_chunk_delay,
    ));
    if config.chat_api_key.is_none() {
        info!("No generation API key configured; readings will use the mock stream");
    }

    // Backend order: free socket protocol first, the credentialed signed
    // endpoint when configured, the batch endpoint as last resort.
    let mut backends: Vec<Box<dyn SynthesisBackend>> =
        vec![Box::new(EdgeSocketBackend::new(config.tts_timeout))];
    if let Some(credentials) = config.volc.clone() {
        backends.push(Box::new(VolcSignedBackend::new(credentials)));
    }
    backends.push(Box::new(TranslateBatchBackend::new()));
    let tts_adapter = Arc::new(SpeechSynthesizer::new(backends));

    let snapshot_store = Arc::new(FileSnapshotStore::new(config.data_dir.clone())?);

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        reading_adapter,
        tts_adapter,
        snapshot_store,
        share_cards: Arc::new(ShareCardComposer::new()),
        http: reqwest::Client::new(),
    });

    // --- 4. Create the Web Router ---
    let allowed_origin = config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid ALLOWED_ORIGIN: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let app = Router::new()
        .route("/api/reading", post(reading_handler))
        .route("/api/tts", post(synthesize_handler))
        .route("/api/divine-image", post(divine_image_handler))
        .route("/api/detect-language", get(detect_language_handler))
        .route("/api/daily", get(daily_handler))
        .route("/api/share-card", post(share_card_handler))
        .route(
            "/api/player-prefs",
            get(get_player_prefs_handler).put(put_player_prefs_handler),
        )
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
