//! services/api/src/adapters/share_card.rs
//!
//! Shareable reading-card images. The primary path fetches a generated scene
//! from a remote image endpoint under a deadline; when that times out or
//! fails, a local SVG composition of the same cards and summary is rendered
//! instead so the caller always receives an image.

use std::fmt::Write as _;
use std::time::Duration;

use rand::Rng;
use tarot_core::domain::{DrawnCard, Language};
use tracing::warn;

const IMAGE_ENDPOINT: &str = "https://image.pollinations.ai/prompt/";
const IMAGE_WIDTH: u32 = 1200;
const IMAGE_HEIGHT: u32 = 675;
const REMOTE_DEADLINE: Duration = Duration::from_secs(15);
const SUMMARY_MAX_CHARS: usize = 150;

/// An image plus its MIME type, ready to serve.
pub struct ShareCard {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Pulls a short display summary out of a full reading: markdown stripped,
/// first substantial paragraph, clipped with an ellipsis past the limit.
pub fn extract_summary(reading: &str) -> String {
    let cleaned = crate::adapters::tts::text::clean_for_speech(reading);
    let summary = cleaned
        .split("\n\n")
        .map(str::trim)
        .find(|p| p.chars().count() > 20)
        .map(str::to_string)
        .unwrap_or_else(|| cleaned.chars().take(200).collect());

    if summary.chars().count() > SUMMARY_MAX_CHARS {
        let clipped: String = summary.chars().take(SUMMARY_MAX_CHARS - 3).collect();
        format!("{clipped}...")
    } else {
        summary
    }
}

fn scene_prompt(cards: &[DrawnCard], is_daily: bool) -> String {
    let descriptions = cards
        .iter()
        .map(|card| {
            let orientation = if card.is_reversed { "reversed" } else { "upright" };
            format!("{} ({orientation})", card.display_name(Language::En))
        })
        .collect::<Vec<_>>()
        .join(", ");
    let base = if is_daily {
        format!("A mystical daily tarot reading scene featuring {descriptions}")
    } else {
        format!("An enchanting three-card tarot spread showing {descriptions}")
    };
    format!(
        "{base}, ethereal purple and gold atmosphere, cinematic lighting, \
sacred geometry background, mysterious fog effects, art nouveau style, \
glowing mystical energy, 8k resolution, highly detailed tarot art"
    )
}

fn remote_url(prompt: &str, seed: u32) -> String {
    let encoded: String = prompt
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect();
    format!(
        "{IMAGE_ENDPOINT}{encoded}?width={IMAGE_WIDTH}&height={IMAGE_HEIGHT}\
&model=turbo&seed={seed}&nologo=true&enhance=true&private=true"
    )
}

/// Renders the local composition: dark gradient, decorative frame, one panel
/// per card with its name and orientation, and the summary beneath.
fn compose_svg(cards: &[DrawnCard], summary: &str, language: Language) -> String {
    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{IMAGE_WIDTH}\" height=\"{IMAGE_HEIGHT}\" \
viewBox=\"0 0 {IMAGE_WIDTH} {IMAGE_HEIGHT}\">\
<defs><linearGradient id=\"bg\" x1=\"0\" y1=\"0\" x2=\"0\" y2=\"1\">\
<stop offset=\"0\" stop-color=\"#1a0b2e\"/>\
<stop offset=\"1\" stop-color=\"#2d1b4e\"/>\
</linearGradient></defs>\
<rect width=\"{IMAGE_WIDTH}\" height=\"{IMAGE_HEIGHT}\" fill=\"url(#bg)\"/>\
<rect x=\"20\" y=\"20\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"#d4af37\" \
stroke-width=\"3\" rx=\"15\"/>",
        IMAGE_WIDTH - 40,
        IMAGE_HEIGHT - 40,
    );

    // At most three panels fit the fixed canvas.
    let cards = &cards[..cards.len().min(3)];
    let panel_width = 220u32;
    let panel_height = 360u32;
    let count = cards.len().max(1) as u32;
    let spacing = 40u32;
    let total = count * panel_width + (count - 1) * spacing;
    let start_x = (IMAGE_WIDTH - total) / 2;
    let panel_y = 80u32;

    for (index, card) in cards.iter().enumerate() {
        let x = start_x + index as u32 * (panel_width + spacing);
        let name = xml_escape(&card.display_name(language));
        let orientation = xml_escape(&card.orientation_label(language));
        let _ = write!(
            svg,
            "<rect x=\"{x}\" y=\"{panel_y}\" width=\"{panel_width}\" height=\"{panel_height}\" \
fill=\"#120826\" stroke=\"#d4af37\" stroke-width=\"2\" rx=\"12\"/>\
<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" fill=\"#f0e6ff\" \
font-family=\"serif\" font-size=\"26\">{name}</text>\
<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" fill=\"#d4af37\" \
font-family=\"serif\" font-size=\"20\">{orientation}</text>",
            x + panel_width / 2,
            panel_y + panel_height + 40,
            x + panel_width / 2,
            panel_y + panel_height + 72,
        );
    }

    let _ = write!(
        svg,
        "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" fill=\"#cbb8e8\" \
font-family=\"serif\" font-size=\"22\">{}</text></svg>",
        IMAGE_WIDTH / 2,
        IMAGE_HEIGHT - 60,
        xml_escape(summary),
    );
    svg
}

/// Produces a share card for a finished reading, preferring the remote
/// generated scene and falling back to the local composition.
pub struct ShareCardComposer {
    client: reqwest::Client,
}

impl ShareCardComposer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_remote(&self, url: &str) -> Option<Vec<u8>> {
        let request = self.client.get(url).send();
        let response = match tokio::time::timeout(REMOTE_DEADLINE, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Remote scene fetch failed: {e}");
                return None;
            }
            Err(_) => {
                warn!(
                    "Remote scene fetch exceeded {}s deadline",
                    REMOTE_DEADLINE.as_secs()
                );
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "Remote scene endpoint refused request");
            return None;
        }
        match tokio::time::timeout(REMOTE_DEADLINE, response.bytes()).await {
            Ok(Ok(bytes)) if !bytes.is_empty() => Some(bytes.to_vec()),
            _ => None,
        }
    }

    pub async fn compose(
        &self,
        cards: &[DrawnCard],
        reading: &str,
        language: Language,
        is_daily: bool,
    ) -> ShareCard {
        let summary = extract_summary(reading);
        let prompt = scene_prompt(cards, is_daily);
        let seed = rand::thread_rng().gen_range(0..1_000_000);
        if let Some(bytes) = self.fetch_remote(&remote_url(&prompt, seed)).await {
            return ShareCard {
                content_type: "image/jpeg",
                bytes,
            };
        }
        ShareCard {
            content_type: "image/svg+xml",
            bytes: compose_svg(cards, &summary, language).into_bytes(),
        }
    }
}

impl Default for ShareCardComposer {
    fn default() -> Self {
        Self::new()
    }
}
