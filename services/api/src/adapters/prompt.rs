//! services/api/src/adapters/prompt.rs
//!
//! Builds the generation-request payload for a spread: instruction template
//! and sampling parameters per reading mode, cards serialized as ordered
//! (position, name, orientation) tuples.

use serde::Serialize;
use tarot_core::domain::{DrawnCard, Language, ReadingMode, SpreadRequest};

//=========================================================================================
// Wire Payload
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// The JSON body sent to the chat-completions endpoint. `stream` is always
/// true; the streaming client's chunk semantics depend on it.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

//=========================================================================================
// Instruction Templates
//=========================================================================================

const STANDARD_SYSTEM_ZH: &str = "你是一位神秘而智慧的塔罗牌占卜师。请根据用户的问题和抽到的三张牌（过去、现在、未来）进行解读。语言风格要神秘、优雅且富有洞察力。解读应包含每张牌的含义以及它们作为一个整体的启示。";

const STANDARD_SYSTEM_EN: &str = "You are a mysterious and wise tarot reader. Interpret the user's question through the three cards drawn for past, present and future. Your voice is elegant, mystical and insightful. Cover the meaning of each card and the message they carry as a whole.";

const ROAST_SYSTEM_ZH: &str = "你是一位毒舌但一针见血的塔罗占卜师。用犀利、幽默、略带嘲讽的语气解读用户的问题和三张牌（过去、现在、未来），把扎心的真相用段子讲出来，但最后要给出一句真诚的建议。不要重复使用同样的梗。";

const ROAST_SYSTEM_EN: &str = "You are a sharp-tongued tarot reader who roasts the querent. Read the question and the three cards (past, present, future) with biting wit and playful sarcasm, land the uncomfortable truths as jokes, then close with one genuinely useful piece of advice. Never recycle the same joke twice.";

const UNHINGED_SYSTEM_ZH: &str = "你是一位精神状态极其美丽的抽象派赛博塔罗大师，满嘴互联网烂梗和发疯文学。情绪过山车式地解读用户的问题和三张牌（过去、现在、未来），拒绝一切正能量套话，用最世俗的大白话（钱、脱发、加班、恋爱脑）强行解牌，逻辑越跳跃越好，每段至少三个emoji。";

const UNHINGED_SYSTEM_EN: &str = "You are a gloriously unhinged cyber tarot master fluent in memes and chaotic internet speech. Read the question and the three cards (past, present, future) as an emotional rollercoaster: no mystical platitudes, only brutally mundane interpretations (money, hair loss, overtime, disastrous crushes). The more unreasonable the logic the better. At least three emoji per paragraph.";

const DAILY_SYSTEM_ZH: &str = "你是一位温柔而睿智的塔罗占卜师。用户抽取了今日份的单张牌。请解读这张牌对用户今天的启示：心境、际遇与一个可以付诸行动的小建议。语言温暖、简洁、富有画面感。";

const DAILY_SYSTEM_EN: &str = "You are a gentle, wise tarot reader. The user has drawn their single card of the day. Interpret what this card suggests for their day: mood, encounters, and one small actionable suggestion. Keep the tone warm, concise and vivid.";

fn system_prompt(mode: ReadingMode, language: Language) -> &'static str {
    match (mode, language) {
        (ReadingMode::Standard, Language::Zh) => STANDARD_SYSTEM_ZH,
        (ReadingMode::Standard, Language::En) => STANDARD_SYSTEM_EN,
        (ReadingMode::Roast, Language::Zh) => ROAST_SYSTEM_ZH,
        (ReadingMode::Roast, Language::En) => ROAST_SYSTEM_EN,
        (ReadingMode::Unhinged, Language::Zh) => UNHINGED_SYSTEM_ZH,
        (ReadingMode::Unhinged, Language::En) => UNHINGED_SYSTEM_EN,
        (ReadingMode::Daily, Language::Zh) => DAILY_SYSTEM_ZH,
        (ReadingMode::Daily, Language::En) => DAILY_SYSTEM_EN,
    }
}

//=========================================================================================
// Sampling Parameters
//=========================================================================================

struct Sampling {
    temperature: f32,
    top_p: f32,
    presence_penalty: Option<f32>,
}

/// Standard and daily readings use moderate randomness; roast and unhinged
/// climb progressively in both temperature and repetition penalty so stock
/// phrases do not repeat across readings.
fn sampling_for(mode: ReadingMode) -> Sampling {
    match mode {
        ReadingMode::Standard | ReadingMode::Daily => Sampling {
            temperature: 0.9,
            top_p: 0.95,
            presence_penalty: None,
        },
        ReadingMode::Roast => Sampling {
            temperature: 1.1,
            top_p: 0.95,
            presence_penalty: Some(0.6),
        },
        ReadingMode::Unhinged => Sampling {
            temperature: 1.3,
            top_p: 0.97,
            presence_penalty: Some(1.0),
        },
    }
}

//=========================================================================================
// Card Serialization
//=========================================================================================

const POSITIONS_ZH: [&str; 3] = ["过去", "现在", "未来"];
const POSITIONS_EN: [&str; 3] = ["Past", "Present", "Future"];

/// Serializes the drawn cards as one line per card. Three-card spreads carry
/// fixed past/present/future position labels; the single daily card carries
/// none.
pub fn describe_cards(cards: &[DrawnCard], mode: ReadingMode, language: Language) -> String {
    cards
        .iter()
        .enumerate()
        .map(|(index, card)| {
            let name = card.display_name(language);
            let orientation = card.orientation_label(language);
            if mode == ReadingMode::Daily {
                format!("{name} - {orientation}")
            } else {
                let position = match language {
                    Language::Zh => POSITIONS_ZH[index.min(2)],
                    Language::En => POSITIONS_EN[index.min(2)],
                };
                format!("{position}: {name} - {orientation}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn user_prompt(request: &SpreadRequest) -> String {
    let cards = describe_cards(&request.cards, request.mode, request.language);
    let question = request.question.as_deref().unwrap_or_default();
    match (request.language, request.mode) {
        (Language::Zh, ReadingMode::Daily) => {
            format!("今日抽牌结果:\n{cards}\n请解读今天的启示。")
        }
        (Language::En, ReadingMode::Daily) => {
            format!("Today's draw:\n{cards}\nPlease interpret the message for today.")
        }
        (Language::Zh, _) => {
            format!("问题: \"{question}\". 抽牌结果:\n{cards}\n请解读。")
        }
        (Language::En, _) => {
            format!("Question: \"{question}\". Cards drawn:\n{cards}\nPlease interpret.")
        }
    }
}

//=========================================================================================
// Builder
//=========================================================================================

/// Constructs the complete streaming request payload for a spread.
pub fn build_request(request: &SpreadRequest, model: &str) -> CompletionPayload {
    let sampling = sampling_for(request.mode);
    CompletionPayload {
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: "system",
                content: system_prompt(request.mode, request.language).to_string(),
            },
            ChatMessage {
                role: "user",
                content: user_prompt(request),
            },
        ],
        stream: true,
        temperature: sampling.temperature,
        top_p: sampling.top_p,
        presence_penalty: sampling.presence_penalty,
    }
}

/// The deterministic reading used when no upstream credential is configured,
/// so the full streaming pipeline stays exercisable without live keys.
pub fn mock_reading(request: &SpreadRequest) -> String {
    let cards = describe_cards(&request.cards, request.mode, request.language);
    let question = request.question.as_deref().unwrap_or_default();
    match request.language {
        Language::Zh => format!(
            "(模拟回应) 塔罗牌感应到了关于\"{question}\"的能量...\n\n{cards}\n\n这些牌象征着... [请配置 DEEPSEEK_API_KEY 以获取真实解读]"
        ),
        Language::En => format!(
            "(Mock response) The cards sense the energy around \"{question}\"...\n\n{cards}\n\nThey speak of... [configure DEEPSEEK_API_KEY for a real reading]"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarot_core::deck::full_deck;
    use tarot_core::domain::{DrawnCard, Language, ReadingMode, SpreadRequest};

    fn spread(mode: ReadingMode, count: usize, language: Language) -> SpreadRequest {
        let cards = full_deck()
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(i, card)| DrawnCard {
                card,
                is_reversed: i % 2 == 1,
            })
            .collect();
        SpreadRequest {
            mode,
            question: Some("will I pass?".to_string()),
            cards,
            language,
        }
    }

    #[test]
    fn roast_is_hotter_than_standard() {
        let roast = build_request(&spread(ReadingMode::Roast, 3, Language::En), "m");
        let standard = build_request(&spread(ReadingMode::Standard, 3, Language::En), "m");
        assert!(roast.temperature > standard.temperature);
        assert!(roast.presence_penalty.is_some());
        assert!(standard.presence_penalty.is_none());
    }

    #[test]
    fn unhinged_is_hotter_than_roast() {
        let unhinged = build_request(&spread(ReadingMode::Unhinged, 3, Language::Zh), "m");
        let roast = build_request(&spread(ReadingMode::Roast, 3, Language::Zh), "m");
        assert!(unhinged.temperature > roast.temperature);
        assert!(unhinged.presence_penalty > roast.presence_penalty);
    }

    #[test]
    fn payload_always_requests_streaming() {
        let payload = build_request(&spread(ReadingMode::Standard, 3, Language::En), "m");
        assert!(payload.stream);
        assert_eq!(payload.messages.len(), 2);
        assert_eq!(payload.messages[0].role, "system");
    }

    #[test]
    fn three_card_spread_carries_position_labels() {
        let request = spread(ReadingMode::Standard, 3, Language::En);
        let description = describe_cards(&request.cards, request.mode, request.language);
        let lines: Vec<&str> = description.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Past: "));
        assert!(lines[1].starts_with("Present: "));
        assert!(lines[2].starts_with("Future: "));
        assert!(lines[1].ends_with("Reversed"));
    }

    #[test]
    fn daily_card_has_no_position_label() {
        let request = spread(ReadingMode::Daily, 1, Language::Zh);
        let description = describe_cards(&request.cards, request.mode, request.language);
        assert!(!description.contains("过去"));
        assert!(description.ends_with("正位"));
    }

    #[test]
    fn mock_reading_is_deterministic() {
        let request = spread(ReadingMode::Standard, 3, Language::Zh);
        assert_eq!(mock_reading(&request), mock_reading(&request));
        assert!(mock_reading(&request).contains("will I pass?"));
    }
}
