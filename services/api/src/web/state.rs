//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::share_card::ShareCardComposer;
use crate::config::Config;
use std::sync::Arc;
use tarot_core::ports::{ReadingService, SnapshotStore, TextToSpeechService};

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub reading_adapter: Arc<dyn ReadingService>,
    pub tts_adapter: Arc<dyn TextToSpeechService>,
    pub snapshot_store: Arc<dyn SnapshotStore>,
    pub share_cards: Arc<ShareCardComposer>,
    /// Plain client for the verbatim image-divination proxy.
    pub http: reqwest::Client,
}
