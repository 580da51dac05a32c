//! services/api/src/adapters/tts/edge.rs
//!
//! WebSocket speech-synthesis backend speaking the Edge read-aloud protocol:
//! one text frame configuring the output format, one SSML frame per request,
//! then binary audio frames until a `turn.end` message.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tarot_core::domain::Language;
use tarot_core::ports::{PortError, PortResult, SynthesisBackend};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use uuid::Uuid;

const ENDPOINT: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";
const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";
const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

const VOICE_ZH: &str = "zh-CN-liaoning-XiaobeiNeural";
const VOICE_EN: &str = "en-US-AriaNeural";

fn voice_for(language: Language) -> (&'static str, &'static str) {
    match language {
        Language::Zh => ("zh-CN", VOICE_ZH),
        Language::En => ("en-US", VOICE_EN),
    }
}

fn ssml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn build_ssml(text: &str, language: Language) -> String {
    let (lang_tag, voice) = voice_for(language);
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{lang_tag}'>\
<voice name='{voice}'><prosody rate='+0%' pitch='+0Hz'>{}</prosody></voice></speak>",
        ssml_escape(text)
    )
}

fn config_frame() -> String {
    format!(
        "Content-Type:application/json; charset=utf-8\r\nPath:speech.config\r\n\r\n\
{{\"context\":{{\"synthesis\":{{\"audio\":{{\"metadataoptions\":{{\
\"sentenceBoundaryEnabled\":\"false\",\"wordBoundaryEnabled\":\"false\"}},\
\"outputFormat\":\"{OUTPUT_FORMAT}\"}}}}}}}}"
    )
}

fn ssml_frame(request_id: &str, ssml: &str) -> String {
    format!(
        "X-RequestId:{request_id}\r\nContent-Type:application/ssml+xml\r\n\
Path:ssml\r\n\r\n{ssml}"
    )
}

/// Binary frames carry a textual header block terminated by a blank line
/// before the audio bytes. Frames without audio (or without the delimiter)
/// yield nothing.
fn strip_binary_preamble(frame: &[u8]) -> Option<&[u8]> {
    let delimiter = b"\r\n\r\n";
    frame
        .windows(delimiter.len())
        .position(|window| window == delimiter)
        .map(|pos| &frame[pos + delimiter.len()..])
        .filter(|audio| !audio.is_empty())
}

/// Free, tokenless synthesis backend over the Edge read-aloud WebSocket.
pub struct EdgeSocketBackend {
    timeout: Duration,
}

impl EdgeSocketBackend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_session(&self, text: &str, language: Language) -> PortResult<Vec<u8>> {
        let connection_id = Uuid::new_v4().simple().to_string();
        let url = format!(
            "{ENDPOINT}?TrustedClientToken={TRUSTED_CLIENT_TOKEN}&ConnectionId={connection_id}"
        );

        let (mut socket, _) = connect_async(url)
            .await
            .map_err(|e| PortError::Upstream(format!("Socket connect failed: {e}")))?;

        socket
            .send(Message::Text(config_frame()))
            .await
            .map_err(|e| PortError::Upstream(format!("Config frame send failed: {e}")))?;

        let request_id = Uuid::new_v4().simple().to_string();
        let ssml = build_ssml(text, language);
        socket
            .send(Message::Text(ssml_frame(&request_id, &ssml)))
            .await
            .map_err(|e| PortError::Upstream(format!("SSML frame send failed: {e}")))?;

        let mut audio = Vec::new();
        while let Some(message) = socket.next().await {
            let message =
                message.map_err(|e| PortError::Upstream(format!("Socket read failed: {e}")))?;
            match message {
                Message::Text(text) => {
                    if text.contains("Path:turn.end") {
                        break;
                    }
                }
                Message::Binary(frame) => {
                    if let Some(bytes) = strip_binary_preamble(&frame) {
                        audio.extend_from_slice(bytes);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        let _ = socket.close(None).await;

        debug!(bytes = audio.len(), "Edge synthesis session finished");
        if audio.is_empty() {
            return Err(PortError::Upstream(
                "Edge session produced no audio".to_string(),
            ));
        }
        Ok(audio)
    }
}

#[async_trait]
impl SynthesisBackend for EdgeSocketBackend {
    fn name(&self) -> &'static str {
        "edge"
    }

    fn max_chunk_chars(&self) -> usize {
        800
    }

    async fn synthesize_chunk(&self, text: &str, language: Language) -> PortResult<Vec<u8>> {
        // One hard deadline over the whole session; a stalled socket must not
        // hold the request open indefinitely.
        tokio::time::timeout(self.timeout, self.run_session(text, language))
            .await
            .map_err(|_| {
                PortError::Upstream(format!(
                    "Edge session exceeded {}s deadline",
                    self.timeout.as_secs()
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_is_stripped_from_binary_frames() {
        let frame = b"X-RequestId:abc\r\nPath:audio\r\n\r\n\xff\xf3audio".to_vec();
        assert_eq!(
            strip_binary_preamble(&frame),
            Some(&b"\xff\xf3audio"[..])
        );
    }

    #[test]
    fn frames_without_audio_yield_nothing() {
        assert!(strip_binary_preamble(b"Path:audio\r\n\r\n").is_none());
        assert!(strip_binary_preamble(b"no delimiter here").is_none());
    }

    #[test]
    fn ssml_escapes_markup_characters() {
        let ssml = build_ssml("A & B <joined>", Language::En);
        assert!(ssml.contains("A &amp; B &lt;joined&gt;"));
        assert!(!ssml.contains("<joined>"));
    }

    #[test]
    fn ssml_selects_voice_by_language() {
        assert!(build_ssml("你好", Language::Zh).contains(VOICE_ZH));
        assert!(build_ssml("hello", Language::En).contains(VOICE_EN));
    }

    #[test]
    fn config_frame_requests_mp3_output() {
        let frame = config_frame();
        assert!(frame.contains("Path:speech.config"));
        assert!(frame.contains(OUTPUT_FORMAT));
        assert!(frame.contains("\r\n\r\n"));
    }

    #[test]
    fn ssml_frame_carries_request_id_and_path() {
        let frame = ssml_frame("req-1", "<speak/>");
        assert!(frame.starts_with("X-RequestId:req-1\r\n"));
        assert!(frame.contains("Path:ssml"));
        assert!(frame.ends_with("<speak/>"));
    }
}
