//! crates/tarot_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! generation endpoint, the synthesis backends, or the storage layer.

use crate::domain::{DailySnapshot, DrawnCard, Language, PlayerPrefs, SpreadRequest};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services
/// (e.g., network, filesystem).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Upstream rejected the request: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Raised only when every configured synthesis backend has failed or
/// produced zero usable audio bytes.
#[derive(Debug, thiserror::Error)]
#[error("speech synthesis failed: {0}")]
pub struct SynthesisError(pub String);

/// An ordered stream of reading-text deltas.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, PortError>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ReadingService: Send + Sync {
    /// Opens a streaming generation request for the given spread and returns
    /// the delta stream. Deltas arrive in strict order; a transport failure
    /// surfaces as a single in-band notice chunk rather than a stream error.
    async fn stream_reading(&self, request: &SpreadRequest) -> PortResult<ChunkStream>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Converts text into one contiguous MP3 payload, trying each configured
    /// backend in turn before giving up.
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, SynthesisError>;
}

/// One concrete wire-protocol implementation of text-to-audio conversion.
/// Implementations receive text already cleaned and cut under their ceiling.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// The longest chunk this backend accepts per call.
    fn max_chunk_chars(&self) -> usize;

    async fn synthesize_chunk(&self, text: &str, language: Language) -> PortResult<Vec<u8>>;
}

/// The date-keyed, single-slot daily card cache plus the small player
/// preference slot. Writes are atomic whole-slot replacements.
pub trait SnapshotStore: Send + Sync {
    /// True iff a snapshot exists and carries today's local date.
    fn has_today(&self) -> bool;

    /// Returns the snapshot only if its date matches today. A snapshot from a
    /// prior date is treated as absent, not deleted; the next write replaces
    /// the slot wholesale.
    fn get_today(&self) -> Option<DailySnapshot>;

    /// Unconditionally overwrites the slot with `{date: today, card, reading}`.
    fn save_today(&self, card: &DrawnCard, reading: &str) -> PortResult<()>;

    /// Replaces the reading of today's snapshot with the given fully
    /// accumulated text. No-op when no same-day snapshot exists (a reset may
    /// have raced the stream).
    fn append_today(&self, reading: &str) -> PortResult<()>;

    fn load_player_prefs(&self) -> PlayerPrefs;

    fn save_player_prefs(&self, prefs: &PlayerPrefs) -> PortResult<()>;
}
