//! services/api/src/adapters/tts/mod.rs
//!
//! The speech-synthesis adapter: text preparation, per-backend chunking, and
//! the fallback chain across heterogeneous wire protocols.

pub mod edge;
pub mod text;
pub mod translate;
pub mod volc;

use async_trait::async_trait;
use tarot_core::domain::Language;
use tarot_core::ports::{SynthesisBackend, SynthesisError, TextToSpeechService};
use tracing::{info, warn};

/// Dispatches synthesis across an ordered list of backends.
///
/// For each backend the text is re-chunked under that backend's own ceiling
/// and chunks are sent sequentially so the concatenated audio preserves text
/// order. A failed chunk is skipped; a backend only counts as failed when it
/// produces zero audio bytes overall, at which point the next backend is
/// tried with the same cleaned text.
pub struct SpeechSynthesizer {
    backends: Vec<Box<dyn SynthesisBackend>>,
}

impl SpeechSynthesizer {
    pub fn new(backends: Vec<Box<dyn SynthesisBackend>>) -> Self {
        Self { backends }
    }

    async fn try_backend(
        &self,
        backend: &dyn SynthesisBackend,
        chunks: &[String],
        language: Language,
    ) -> Vec<u8> {
        let mut audio = Vec::new();
        let mut failed = 0usize;
        for chunk in chunks {
            match backend.synthesize_chunk(chunk, language).await {
                Ok(bytes) => audio.extend_from_slice(&bytes),
                Err(e) => {
                    failed += 1;
                    warn!(backend = backend.name(), "Chunk synthesis failed, skipping: {e}");
                }
            }
        }
        if failed > 0 {
            info!(
                backend = backend.name(),
                failed,
                total = chunks.len(),
                "Synthesis finished with skipped chunks"
            );
        }
        audio
    }
}

#[async_trait]
impl TextToSpeechService for SpeechSynthesizer {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, SynthesisError> {
        let cleaned = text::clean_for_speech(text);
        if cleaned.is_empty() {
            return Err(SynthesisError("nothing to synthesize".to_string()));
        }

        for backend in &self.backends {
            let chunks = text::chunk_for_synthesis(&cleaned, backend.max_chunk_chars());
            let audio = self.try_backend(backend.as_ref(), &chunks, language).await;
            if !audio.is_empty() {
                info!(
                    backend = backend.name(),
                    bytes = audio.len(),
                    "Synthesis succeeded"
                );
                return Ok(audio);
            }
            warn!(
                backend = backend.name(),
                "Backend produced no audio, falling back"
            );
        }
        Err(SynthesisError(
            "every configured backend failed".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarot_core::ports::{PortError, PortResult};

    /// Stub that answers each chunk with its own marker byte, optionally
    /// failing on chunks containing a poison substring.
    struct StubBackend {
        name: &'static str,
        marker: u8,
        ceiling: usize,
        poison: Option<&'static str>,
    }

    #[async_trait]
    impl SynthesisBackend for StubBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        fn max_chunk_chars(&self) -> usize {
            self.ceiling
        }

        async fn synthesize_chunk(&self, text: &str, _language: Language) -> PortResult<Vec<u8>> {
            if let Some(poison) = self.poison {
                if text.contains(poison) {
                    return Err(PortError::Upstream("poisoned".to_string()));
                }
            }
            Ok(vec![self.marker; 2])
        }
    }

    struct DeadBackend;

    #[async_trait]
    impl SynthesisBackend for DeadBackend {
        fn name(&self) -> &'static str {
            "dead"
        }

        fn max_chunk_chars(&self) -> usize {
            100
        }

        async fn synthesize_chunk(&self, _text: &str, _language: Language) -> PortResult<Vec<u8>> {
            Err(PortError::Upstream("always down".to_string()))
        }
    }

    #[tokio::test]
    async fn primary_failure_falls_back_to_secondary() {
        let synthesizer = SpeechSynthesizer::new(vec![
            Box::new(DeadBackend),
            Box::new(StubBackend {
                name: "stub",
                marker: 7,
                ceiling: 100,
                poison: None,
            }),
        ]);
        let audio = synthesizer
            .synthesize("A reading.", Language::En)
            .await
            .unwrap();
        assert!(!audio.is_empty());
        assert!(audio.iter().all(|&b| b == 7));
    }

    #[tokio::test]
    async fn chain_exhaustion_is_an_error() {
        let synthesizer =
            SpeechSynthesizer::new(vec![Box::new(DeadBackend), Box::new(DeadBackend)]);
        let result = synthesizer.synthesize("A reading.", Language::En).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn failed_chunks_are_skipped_not_fatal() {
        let synthesizer = SpeechSynthesizer::new(vec![Box::new(StubBackend {
            name: "stub",
            marker: 9,
            ceiling: 10,
            poison: Some("bad"),
        })]);
        let audio = synthesizer
            .synthesize("good one. bad one. good two.", Language::En)
            .await
            .unwrap();
        // Two chunks survived, one was skipped.
        assert_eq!(audio.len(), 4);
    }

    #[tokio::test]
    async fn empty_text_cannot_be_synthesized() {
        let synthesizer = SpeechSynthesizer::new(vec![Box::new(StubBackend {
            name: "stub",
            marker: 1,
            ceiling: 100,
            poison: None,
        })]);
        assert!(synthesizer.synthesize("  ", Language::Zh).await.is_err());
        assert!(synthesizer.synthesize("💫✨", Language::Zh).await.is_err());
    }

    #[tokio::test]
    async fn backend_ceilings_drive_chunking() {
        let synthesizer = SpeechSynthesizer::new(vec![Box::new(StubBackend {
            name: "narrow",
            marker: 3,
            ceiling: 5,
            poison: None,
        })]);
        // Four sentences of three chars each, ceiling five: four chunks.
        let audio = synthesizer
            .synthesize("一句。两句。三句。四句。", Language::Zh)
            .await
            .unwrap();
        assert_eq!(audio.len(), 8);
    }
}
