pub mod deck;
pub mod domain;
pub mod ports;

pub use deck::{draw_cards, draw_with_orientation, full_deck, shuffled_deck};
pub use domain::{
    Arcana, DailySnapshot, DrawnCard, Language, PlayerPrefs, ReadingMode, ReadingSession,
    SpreadRequest, Suit, TarotCard,
};
pub use ports::{
    ChunkStream, PortError, PortResult, ReadingService, SnapshotStore, SynthesisBackend,
    SynthesisError, TextToSpeechService,
};
