pub mod locale;
pub mod rest;
pub mod state;

// Re-export the handlers so the binary can assemble the router without
// reaching into submodules.
pub use locale::detect_language_handler;
pub use rest::{
    daily_handler, divine_image_handler, get_player_prefs_handler, put_player_prefs_handler,
    reading_handler, share_card_handler, synthesize_handler,
};
