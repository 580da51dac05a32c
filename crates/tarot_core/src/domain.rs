//! crates/tarot_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or wire format beyond
//! their serde representation.

use serde::{Deserialize, Serialize};

/// The two languages the application speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }

    /// Parses a cookie/query value; anything unrecognized is treated as absent.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "zh" => Some(Language::Zh),
            "en" => Some(Language::En),
            _ => None,
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Language::parse(value).ok_or_else(|| format!("unknown language: '{value}'"))
    }
}

/// The kind of reading the user asked for. Selects the instruction template
/// and the sampling parameters of the generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingMode {
    Standard,
    Roast,
    Unhinged,
    Daily,
}

/// Minor arcana suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Wands,
    Cups,
    Swords,
    Pentacles,
}

/// Card family classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "suit")]
pub enum Arcana {
    Major,
    Minor(Suit),
}

/// One entry of the static 78-card deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TarotCard {
    pub id: u8,
    pub name: String,
    pub name_cn: String,
    pub arcana: Arcana,
}

/// A card that has been drawn, with its orientation fixed at draw time.
/// Immutable once drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawnCard {
    #[serde(flatten)]
    pub card: TarotCard,
    pub is_reversed: bool,
}

impl DrawnCard {
    pub fn display_name(&self, language: Language) -> &str {
        match language {
            Language::Zh => &self.card.name_cn,
            Language::En => &self.card.name,
        }
    }

    pub fn orientation_label(&self, language: Language) -> &'static str {
        match (language, self.is_reversed) {
            (Language::Zh, true) => "逆位",
            (Language::Zh, false) => "正位",
            (Language::En, true) => "Reversed",
            (Language::En, false) => "Upright",
        }
    }
}

/// A fully specified request for one reading.
#[derive(Debug, Clone, Deserialize)]
pub struct SpreadRequest {
    pub mode: ReadingMode,
    #[serde(default)]
    pub question: Option<String>,
    pub cards: Vec<DrawnCard>,
    pub language: Language,
}

/// Ephemeral state for one reading flow: accumulates streamed text and
/// guards against chunks that arrive after the session was reset.
#[derive(Debug)]
pub struct ReadingSession {
    pub question: Option<String>,
    pub cards: Vec<DrawnCard>,
    reading: String,
    complete: bool,
    generation: u64,
}

impl ReadingSession {
    pub fn new(question: Option<String>, cards: Vec<DrawnCard>) -> Self {
        Self {
            question,
            cards,
            reading: String::new(),
            complete: false,
            generation: 0,
        }
    }

    /// The generation a streaming task must capture before it starts
    /// delivering chunks.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reading(&self) -> &str {
        &self.reading
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Appends a chunk if it belongs to the current generation. Stray chunks
    /// from an abandoned stream are dropped, not an error.
    pub fn apply_chunk(&mut self, generation: u64, chunk: &str) -> bool {
        if generation != self.generation || self.complete {
            return false;
        }
        self.reading.push_str(chunk);
        true
    }

    pub fn finish(&mut self, generation: u64) {
        if generation == self.generation {
            self.complete = true;
        }
    }

    /// Abandons any in-flight stream and clears accumulated state.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.reading.clear();
        self.complete = false;
        self.cards.clear();
        self.question = None;
    }
}

/// The persisted once-per-day card slot. The `date` field is the local
/// calendar date the snapshot was taken; a mismatching date means the
/// snapshot is logically expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: String,
    pub card: DrawnCard,
    pub reading: String,
}

/// Persisted audio playback preference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPrefs {
    pub volume: f32,
    pub is_muted: bool,
}

impl Default for PlayerPrefs {
    fn default() -> Self {
        Self {
            volume: 1.0,
            is_muted: false,
        }
    }
}
