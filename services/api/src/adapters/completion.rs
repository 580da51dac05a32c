//! services/api/src/adapters/completion.rs
//!
//! Streaming reading generator backed by an OpenAI-compatible chat-completions
//! endpoint. Three paths through `stream_reading`:
//!
//! 1. No API key configured: a deterministic mock reading is streamed
//!    character by character so the whole pipeline works without credentials.
//! 2. Upstream refuses the request (non-2xx): a single locale-appropriate
//!    notice chunk is emitted in-band and the stream ends normally.
//! 3. Normal case: the response body is fed through the event-stream decoder
//!    and deltas are yielded in arrival order.

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use tarot_core::domain::{Language, SpreadRequest};
use tarot_core::ports::{ChunkStream, PortError, PortResult, ReadingService};
use tracing::{error, info, warn};

use super::prompt;
use super::sse::{SseDecoder, StreamEvent};

const NOTICE_ZH: &str = "[灵界静默：连接断开，请稍后再试]";
const NOTICE_EN: &str = "[The spirits are silent: connection lost, please try again later]";

fn disruption_notice(language: Language) -> &'static str {
    match language {
        Language::Zh => NOTICE_ZH,
        Language::En => NOTICE_EN,
    }
}

/// `ReadingService` implementation over a remote chat-completions endpoint.
pub struct CompletionClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    mock_chunk_delay: Duration,
}

impl CompletionClient {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: String,
        mock_chunk_delay: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            model,
            mock_chunk_delay,
        }
    }

    /// Streams a canned reading one character at a time, pacing chunks so the
    /// consumer sees the same incremental arrival as the live path.
    fn mock_stream(&self, request: &SpreadRequest) -> ChunkStream {
        let text = prompt::mock_reading(request);
        let delay = self.mock_chunk_delay;
        Box::pin(stream! {
            for ch in text.chars() {
                tokio::time::sleep(delay).await;
                yield Ok(ch.to_string());
            }
        })
    }

    fn notice_stream(language: Language) -> ChunkStream {
        let notice = disruption_notice(language).to_string();
        Box::pin(stream! {
            yield Ok(notice);
        })
    }
}

#[async_trait]
impl ReadingService for CompletionClient {
    async fn stream_reading(&self, request: &SpreadRequest) -> PortResult<ChunkStream> {
        let Some(api_key) = self.api_key.clone() else {
            info!("No generation API key configured, streaming mock reading");
            return Ok(self.mock_stream(request));
        };

        let payload = prompt::build_request(request, &self.model);
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Upstream(format!("Generation request failed: {e}")))?;

        // Upstream refusals surface as an in-band notice rather than an error,
        // so the consumer always receives a displayable reading body.
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Generation endpoint refused request: {body}");
            return Ok(Self::notice_stream(request.language));
        }

        let language = request.language;
        let mut bytes = response.bytes_stream();
        let chunk_stream = stream! {
            let mut decoder = SseDecoder::new();
            let mut yielded_any = false;
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        // A transport drop mid-stream also degrades to the
                        // notice so partial output ends with an explanation.
                        warn!("Generation stream interrupted: {e}");
                        yield Ok(disruption_notice(language).to_string());
                        return;
                    }
                };
                for event in decoder.push(&chunk) {
                    match event {
                        StreamEvent::Delta(delta) => {
                            yielded_any = true;
                            yield Ok(delta);
                        }
                        StreamEvent::Done => return,
                    }
                }
                if decoder.is_done() {
                    return;
                }
            }
            if !yielded_any {
                yield Ok(disruption_notice(language).to_string());
            }
        };

        Ok(Box::pin(chunk_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarot_core::deck::full_deck;
    use tarot_core::domain::{DrawnCard, ReadingMode};

    fn spread(language: Language) -> SpreadRequest {
        let cards = full_deck()
            .into_iter()
            .take(3)
            .map(|card| DrawnCard {
                card,
                is_reversed: false,
            })
            .collect();
        SpreadRequest {
            mode: ReadingMode::Standard,
            question: Some("what next?".to_string()),
            cards,
            language,
        }
    }

    #[tokio::test]
    async fn missing_key_streams_mock_reading_in_order() {
        let client = CompletionClient::new(
            "http://unused.invalid".to_string(),
            None,
            "m".to_string(),
            Duration::ZERO,
        );
        let request = spread(Language::En);
        let mut stream = client.stream_reading(&request).await.unwrap();
        let mut assembled = String::new();
        while let Some(chunk) = stream.next().await {
            assembled.push_str(&chunk.unwrap());
        }
        assert_eq!(assembled, prompt::mock_reading(&request));
    }

    #[tokio::test]
    async fn mock_chunks_are_single_characters() {
        let client = CompletionClient::new(
            "http://unused.invalid".to_string(),
            None,
            "m".to_string(),
            Duration::ZERO,
        );
        let request = spread(Language::Zh);
        let mut stream = client.stream_reading(&request).await.unwrap();
        while let Some(chunk) = stream.next().await {
            assert_eq!(chunk.unwrap().chars().count(), 1);
        }
    }

    #[tokio::test]
    async fn notice_stream_is_a_single_locale_chunk() {
        let mut stream = CompletionClient::notice_stream(Language::Zh);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, NOTICE_ZH);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn notices_exist_for_both_languages() {
        assert_ne!(disruption_notice(Language::Zh), disruption_notice(Language::En));
    }

    async fn spawn_stub(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/chat")
    }

    #[tokio::test]
    async fn upstream_refusal_degrades_to_in_band_notice() {
        use axum::http::StatusCode;
        use axum::routing::post;
        let app = axum::Router::new().route(
            "/chat",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = spawn_stub(app).await;

        let client = CompletionClient::new(
            url,
            Some("key".to_string()),
            "m".to_string(),
            Duration::ZERO,
        );
        let mut stream = client.stream_reading(&spread(Language::Zh)).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, NOTICE_ZH);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn live_stream_relays_deltas_in_order() {
        use axum::routing::post;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"塔罗\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"牌\"}}]}\n",
            "data: [DONE]\n",
        );
        let app = axum::Router::new().route(
            "/chat",
            post(move || async move { ([("content-type", "text/event-stream")], body) }),
        );
        let url = spawn_stub(app).await;

        let client = CompletionClient::new(
            url,
            Some("key".to_string()),
            "m".to_string(),
            Duration::ZERO,
        );
        let mut stream = client.stream_reading(&spread(Language::Zh)).await.unwrap();
        let mut deltas = Vec::new();
        while let Some(chunk) = stream.next().await {
            deltas.push(chunk.unwrap());
        }
        assert_eq!(deltas, vec!["塔罗".to_string(), "牌".to_string()]);
    }
}
