//! services/api/src/adapters/tts/volc.rs
//!
//! Signed REST speech-synthesis backend. Each request carries an
//! HMAC-SHA256 signature over a canonical request, scoped to
//! `{date}/{region}/{service}/request`.

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tarot_core::domain::Language;
use tarot_core::ports::{PortError, PortResult, SynthesisBackend};
use uuid::Uuid;

use crate::config::VolcCredentials;

const HOST: &str = "openspeech.bytedance.com";
const PATH: &str = "/api/v1/tts";
const REGION: &str = "cn-north-1";
const SERVICE: &str = "speech_synthesis";
const CLUSTER: &str = "volcano_tts";
const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host;x-content-sha256;x-date";
const SUCCESS_CODE: i64 = 3000;

const VOICE_ZH: &str = "BV700_streaming";
const VOICE_EN: &str = "BV001_streaming";

type HmacSha256 = Hmac<Sha256>;

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub(crate) struct SignatureParts {
    pub content_sha256: String,
    pub authorization: String,
}

/// Builds the signed-request headers for a POST body at a fixed instant.
/// Pure so the signing chain can be verified against known vectors.
pub(crate) fn sign_request(
    access_key: &str,
    secret_key: &str,
    x_date: &str,
    body: &str,
) -> SignatureParts {
    let short_date = &x_date[..8];
    let content_sha256 = sha256_hex(body.as_bytes());

    let canonical_headers = format!(
        "content-type:{CONTENT_TYPE}\nhost:{HOST}\nx-content-sha256:{content_sha256}\nx-date:{x_date}\n"
    );
    let canonical_request = [
        "POST",
        PATH,
        "",
        &canonical_headers,
        SIGNED_HEADERS,
        &content_sha256,
    ]
    .join("\n");

    let credential_scope = format!("{short_date}/{REGION}/{SERVICE}/request");
    let string_to_sign = [
        "HMAC-SHA256",
        x_date,
        &credential_scope,
        &sha256_hex(canonical_request.as_bytes()),
    ]
    .join("\n");

    let key = hmac_sha256(secret_key.as_bytes(), short_date.as_bytes());
    let key = hmac_sha256(&key, REGION.as_bytes());
    let key = hmac_sha256(&key, SERVICE.as_bytes());
    let key = hmac_sha256(&key, b"request");
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    let authorization = format!(
        "HMAC-SHA256 Credential={access_key}/{credential_scope}, \
SignedHeaders={SIGNED_HEADERS}, Signature={signature}"
    );
    SignatureParts {
        content_sha256,
        authorization,
    }
}

#[derive(serde::Deserialize)]
struct VolcResponse {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<String>,
}

/// Credentialed synthesis backend over the signed REST endpoint. Only
/// constructed when all three credential variables are configured.
pub struct VolcSignedBackend {
    client: reqwest::Client,
    credentials: VolcCredentials,
}

impl VolcSignedBackend {
    pub fn new(credentials: VolcCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    fn request_body(&self, text: &str, language: Language) -> String {
        let voice = match language {
            Language::Zh => VOICE_ZH,
            Language::En => VOICE_EN,
        };
        serde_json::json!({
            "app": {
                "appid": self.credentials.app_id,
                "token": "access_token",
                "cluster": CLUSTER,
            },
            "user": { "uid": "user_1" },
            "audio": {
                "voice_type": voice,
                "encoding": "mp3",
                "speed_ratio": 1.0,
                "volume_ratio": 1.0,
                "pitch_ratio": 1.0,
            },
            "request": {
                "reqid": Uuid::new_v4().to_string(),
                "text": text,
                "operation": "query",
            },
        })
        .to_string()
    }
}

#[async_trait]
impl SynthesisBackend for VolcSignedBackend {
    fn name(&self) -> &'static str {
        "volc"
    }

    fn max_chunk_chars(&self) -> usize {
        300
    }

    async fn synthesize_chunk(&self, text: &str, language: Language) -> PortResult<Vec<u8>> {
        let body = self.request_body(text, language);
        let x_date = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let parts = sign_request(
            &self.credentials.access_key,
            &self.credentials.secret_key,
            &x_date,
            &body,
        );

        let response = self
            .client
            .post(format!("https://{HOST}{PATH}"))
            .header("Content-Type", CONTENT_TYPE)
            .header("Host", HOST)
            .header("X-Content-Sha256", &parts.content_sha256)
            .header("X-Date", &x_date)
            .header("Authorization", &parts.authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| PortError::Upstream(format!("Signed synthesis request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PortError::Upstream(format!(
                "Signed synthesis endpoint returned {status}: {text}"
            )));
        }

        let parsed: VolcResponse = response
            .json()
            .await
            .map_err(|e| PortError::Upstream(format!("Unreadable synthesis response: {e}")))?;
        if parsed.code != SUCCESS_CODE {
            return Err(PortError::Upstream(format!(
                "Synthesis endpoint error {}: {}",
                parsed.code, parsed.message
            )));
        }
        let encoded = parsed
            .data
            .ok_or_else(|| PortError::Upstream("Synthesis response carried no audio".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| PortError::Upstream(format!("Audio payload is not valid base64: {e}")))
    }
}
