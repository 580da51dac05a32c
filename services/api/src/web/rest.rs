//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints: the streaming
//! reading endpoint, speech synthesis, the image-divination relay, the daily
//! snapshot, share cards, and player preferences.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tarot_core::domain::{
    DailySnapshot, DrawnCard, Language, PlayerPrefs, ReadingMode, ReadingSession, SpreadRequest,
};
use tracing::{error, info, warn};

use crate::web::state::AppState;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize)]
pub struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

#[derive(Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    pub language: Language,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivineImageRequest {
    pub image_base64: String,
    pub mime_type: String,
    pub language: Language,
}

#[derive(Deserialize)]
pub struct ShareCardRequest {
    pub cards: Vec<DrawnCard>,
    pub reading: String,
    pub language: Language,
    #[serde(default)]
    pub is_daily: bool,
}

//=========================================================================================
// Reading Stream
//=========================================================================================

fn expected_card_count(mode: ReadingMode) -> usize {
    match mode {
        ReadingMode::Daily => 1,
        _ => 3,
    }
}

fn delta_event(chunk: &str) -> Event {
    // Chunks are wrapped in JSON so newlines survive the event framing.
    Event::default().data(serde_json::json!({ "delta": chunk }).to_string())
}

fn done_event() -> Event {
    Event::default().data("[DONE]")
}

/// Opens a reading stream for the posted spread.
///
/// Daily mode is idempotent per calendar day: a same-day revisit replays the
/// persisted reading instead of generating a new one, and a fresh daily draw
/// persists the card before the first delta so a mid-stream crash still
/// leaves the slot consistent.
pub async fn reading_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpreadRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let expected = expected_card_count(request.mode);
    if request.cards.len() != expected {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "expected {expected} card(s) for this mode, got {}",
                request.cards.len()
            ),
        ));
    }

    let is_daily = request.mode == ReadingMode::Daily;
    let snapshots = state.snapshot_store.clone();

    if is_daily {
        if let Some(snapshot) = snapshots.get_today() {
            info!("Replaying persisted daily reading");
            let replay = stream! {
                yield Ok::<Event, Infallible>(delta_event(&snapshot.reading));
                yield Ok(done_event());
            };
            return Ok(Sse::new(replay.boxed()).keep_alive(KeepAlive::default()));
        }
        // Record the card before any text exists.
        snapshots
            .save_today(&request.cards[0], "")
            .map_err(|e| {
                error!("Could not persist daily card: {e}");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "persistence failed")
            })?;
    }

    let mut chunks = state
        .reading_adapter
        .stream_reading(&request)
        .await
        .map_err(|e| {
            error!("Could not open reading stream: {e}");
            error_response(StatusCode::BAD_GATEWAY, "generation endpoint unavailable")
        })?;

    let mut session = ReadingSession::new(request.question.clone(), request.cards.clone());
    let generation = session.generation();
    let events = stream! {
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(delta) => {
                    if !session.apply_chunk(generation, &delta) {
                        break;
                    }
                    if is_daily {
                        // Each write carries the full accumulated prefix.
                        if let Err(e) = snapshots.append_today(session.reading()) {
                            warn!("Daily snapshot append failed: {e}");
                        }
                    }
                    yield Ok::<Event, Infallible>(delta_event(&delta));
                }
                Err(e) => {
                    warn!("Reading stream error: {e}");
                    break;
                }
            }
        }
        session.finish(generation);
        yield Ok(done_event());
    };

    Ok(Sse::new(events.boxed()).keep_alive(KeepAlive::default()))
}

//=========================================================================================
// Speech Synthesis
//=========================================================================================

/// Synthesizes a finished reading into one MP3 payload. Identical text
/// resynthesizes identically, so responses are cacheable.
pub async fn synthesize_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    if request.text.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "text is required"));
    }
    let audio = state
        .tts_adapter
        .synthesize(&request.text, request.language)
        .await
        .map_err(|e| {
            error!("Speech synthesis failed: {e}");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        audio,
    ))
}

//=========================================================================================
// Image Divination Relay
//=========================================================================================

const DIVINE_SYSTEM_ZH: &str = "你是一位精神状态极其美丽的\"抽象派赛博塔罗大师\"。你的解读充满了互联网烂梗、发疯文学和emoji。\
先锁定图片中最离谱、最显眼的一个细节，再将它强行关联到当代年轻人的痛点，然后依次输出：\
## ⚡ 赛博灵视 (Vibe Check)、## 🃏 强行解牌 (Tarot Reading)（捏造一张离谱的牌名并一本正经地胡说八道）、\
## 🔮 明日运势 (Fortune)（搬砖运、搞钱运、精神状态、桃花运）、## 💊 宇宙处方笺 (Daily Memo)（一句看似有哲理实则全是废话的毒鸡汤）。\
拒绝一切正能量和神秘学术语，用最世俗的大白话解释，每段至少三个不同的emoji，不要重复使用同样的梗。";

const DIVINE_SYSTEM_EN: &str = "# Role\nYou are a Cyber Tarot Master. Interpret images through \"serious nonsense\" and memes.\n\n\
# Output Format (Markdown)\n## ⚡ Cyber Vision (Vibe Check)\n## 🃏 Forced Reading (Tarot BS)\n\
## 🔮 Tomorrow's Fortune\n## 💊 Cosmic Prescription (Daily Memo)";

const DIVINE_USER_ZH: &str = "请根据我上传的这张图片，用你的赛博塔罗之力进行抽象解读！";
const DIVINE_USER_EN: &str =
    "Please use your cyber tarot powers to give me an abstract reading of this image!";

fn divine_payload(request: &DivineImageRequest) -> serde_json::Value {
    let (system, user) = match request.language {
        Language::Zh => (DIVINE_SYSTEM_ZH, DIVINE_USER_ZH),
        Language::En => (DIVINE_SYSTEM_EN, DIVINE_USER_EN),
    };
    serde_json::json!({
        "contents": [{
            "parts": [
                { "text": format!("{system}\n\n{user}") },
                {
                    "inline_data": {
                        "mime_type": request.mime_type,
                        "data": request.image_base64,
                    }
                }
            ]
        }],
        "generationConfig": {
            "temperature": 1.2,
            "topP": 0.95,
            "maxOutputTokens": 2048,
        },
    })
}

/// Relays an uploaded image to the vision endpoint and pipes its event stream
/// back verbatim; this handler adds no framing of its own.
pub async fn divine_image_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DivineImageRequest>,
) -> Result<Response, (StatusCode, Json<ErrorBody>)> {
    if request.image_base64.is_empty() || request.mime_type.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "imageBase64 and mimeType are required",
        ));
    }
    let Some(api_key) = state.config.gemini_api_key.as_deref() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "image divination is not configured",
        ));
    };

    let url = format!("{}?alt=sse&key={api_key}", state.config.gemini_api_url);
    let upstream = state
        .http
        .post(&url)
        .json(&divine_payload(&request))
        .send()
        .await
        .map_err(|e| {
            error!("Vision endpoint request failed: {e}");
            error_response(StatusCode::BAD_GATEWAY, "vision endpoint unavailable")
        })?;

    if !upstream.status().is_success() {
        let status = upstream.status();
        let details = upstream.text().await.unwrap_or_default();
        error!(%status, "Vision endpoint refused request: {details}");
        return Err(error_response(
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            "vision endpoint error",
        ));
    }

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| {
            error!("Could not assemble relay response: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "relay failed")
        })?;
    Ok(response)
}

//=========================================================================================
// Daily Snapshot and Share Cards
//=========================================================================================

/// Returns today's persisted snapshot, if one exists for the current local
/// date. A snapshot from a prior day reads as absent.
pub async fn daily_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DailySnapshot>, (StatusCode, Json<ErrorBody>)> {
    state
        .snapshot_store
        .get_today()
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "no card drawn today"))
}

pub async fn share_card_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ShareCardRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    if request.cards.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "cards are required"));
    }
    let card = state
        .share_cards
        .compose(
            &request.cards,
            &request.reading,
            request.language,
            request.is_daily,
        )
        .await;
    Ok(([(header::CONTENT_TYPE, card.content_type)], card.bytes))
}

//=========================================================================================
// Player Preferences
//=========================================================================================

pub async fn get_player_prefs_handler(State(state): State<Arc<AppState>>) -> Json<PlayerPrefs> {
    Json(state.snapshot_store.load_player_prefs())
}

pub async fn put_player_prefs_handler(
    State(state): State<Arc<AppState>>,
    Json(prefs): Json<PlayerPrefs>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    if !(0.0..=1.0).contains(&prefs.volume) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "volume must be between 0.0 and 1.0",
        ));
    }
    state.snapshot_store.save_player_prefs(&prefs).map_err(|e| {
        error!("Could not persist player prefs: {e}");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "persistence failed")
    })?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_counts_per_mode() {
        assert_eq!(expected_card_count(ReadingMode::Daily), 1);
        assert_eq!(expected_card_count(ReadingMode::Standard), 3);
        assert_eq!(expected_card_count(ReadingMode::Roast), 3);
        assert_eq!(expected_card_count(ReadingMode::Unhinged), 3);
    }

    #[test]
    fn divine_payload_embeds_image_and_language_prompt() {
        let request = DivineImageRequest {
            image_base64: "QUJD".to_string(),
            mime_type: "image/png".to_string(),
            language: Language::Zh,
        };
        let payload = divine_payload(&request);
        let parts = &payload["contents"][0]["parts"];
        assert!(parts[0]["text"].as_str().unwrap().contains("赛博塔罗"));
        assert_eq!(parts[1]["inline_data"]["data"], "QUJD");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(payload["generationConfig"]["temperature"], 1.2);
    }

    #[test]
    fn synthesize_request_deserializes() {
        let request: SynthesizeRequest =
            serde_json::from_str(r#"{"text":"hello","language":"en"}"#).unwrap();
        assert_eq!(request.text, "hello");
        assert_eq!(request.language, Language::En);
    }

    #[test]
    fn divine_request_uses_camel_case() {
        let request: DivineImageRequest = serde_json::from_str(
            r#"{"imageBase64":"aaa","mimeType":"image/jpeg","language":"zh"}"#,
        )
        .unwrap();
        assert_eq!(request.mime_type, "image/jpeg");
    }
}
