//! services/api/src/adapters/tts/translate.rs
//!
//! Batch REST synthesis backend over the public translate read-aloud
//! endpoint. One GET per chunk; the endpoint caps input length well below the
//! other backends, so this sits last in the fallback chain.

use async_trait::async_trait;
use tarot_core::domain::Language;
use tarot_core::ports::{PortError, PortResult, SynthesisBackend};

const ENDPOINT: &str = "https://translate.google.com/translate_tts";
// The endpoint rejects anonymous clients without this value.
const CLIENT: &str = "tw-ob";

fn locale_tag(language: Language) -> &'static str {
    match language {
        Language::Zh => "zh-CN",
        Language::En => "en-US",
    }
}

/// Tokenless batch backend of last resort.
pub struct TranslateBatchBackend {
    client: reqwest::Client,
}

impl TranslateBatchBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for TranslateBatchBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SynthesisBackend for TranslateBatchBackend {
    fn name(&self) -> &'static str {
        "translate"
    }

    fn max_chunk_chars(&self) -> usize {
        200
    }

    async fn synthesize_chunk(&self, text: &str, language: Language) -> PortResult<Vec<u8>> {
        let response = self
            .client
            .get(ENDPOINT)
            .query(&[
                ("ie", "UTF-8"),
                ("client", CLIENT),
                ("tl", locale_tag(language)),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| PortError::Upstream(format!("Batch synthesis request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PortError::Upstream(format!(
                "Batch synthesis endpoint returned {}",
                response.status()
            )));
        }
        let audio = response
            .bytes()
            .await
            .map_err(|e| PortError::Upstream(format!("Batch synthesis body read failed: {e}")))?;
        if audio.is_empty() {
            return Err(PortError::Upstream(
                "Batch synthesis returned an empty body".to_string(),
            ));
        }
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_tags_cover_both_languages() {
        assert_eq!(locale_tag(Language::Zh), "zh-CN");
        assert_eq!(locale_tag(Language::En), "en-US");
    }
}
