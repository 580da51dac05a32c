pub mod completion;
pub mod prompt;
pub mod share_card;
pub mod snapshot;
pub mod sse;
pub mod tts;

pub use completion::CompletionClient;
pub use share_card::ShareCardComposer;
pub use snapshot::FileSnapshotStore;
pub use tts::SpeechSynthesizer;
