//! services/api/src/adapters/snapshot.rs
//!
//! File-backed implementation of the daily snapshot store. One JSON file per
//! slot under the data directory: `daily_card.json` holds the single-card
//! snapshot for the current local date, `player_prefs.json` holds the small
//! audio-player preference blob.

use std::fs;
use std::path::{Path, PathBuf};

use tarot_core::domain::{DailySnapshot, DrawnCard, PlayerPrefs};
use tarot_core::ports::{PortError, PortResult, SnapshotStore};
use tracing::warn;

const SNAPSHOT_FILE: &str = "daily_card.json";
const PREFS_FILE: &str = "player_prefs.json";

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Stores the daily snapshot and player preferences as JSON files, replacing
/// each slot atomically via a temp file and rename.
pub struct FileSnapshotStore {
    data_dir: PathBuf,
}

impl FileSnapshotStore {
    /// Creates the store, ensuring the data directory exists.
    pub fn new(data_dir: impl Into<PathBuf>) -> PortResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .map_err(|e| PortError::Unexpected(format!("Cannot create data dir: {e}")))?;
        Ok(Self { data_dir })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    fn prefs_path(&self) -> PathBuf {
        self.data_dir.join(PREFS_FILE)
    }

    /// Writes the serialized slot to a temp file in the same directory and
    /// renames it over the target, so a crash mid-write never leaves a
    /// truncated slot behind.
    fn write_slot<T: serde::Serialize>(&self, path: &Path, value: &T) -> PortResult<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| PortError::Unexpected(format!("Cannot serialize slot: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| PortError::Unexpected(format!("Cannot write slot: {e}")))?;
        fs::rename(&tmp, path)
            .map_err(|e| PortError::Unexpected(format!("Cannot commit slot: {e}")))?;
        Ok(())
    }

    /// Reads the raw snapshot regardless of date. An unreadable or corrupt
    /// file is logged and treated as absent so one bad write cannot wedge the
    /// daily flow.
    fn read_snapshot(&self) -> Option<DailySnapshot> {
        let raw = fs::read_to_string(self.snapshot_path()).ok()?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Discarding unreadable daily snapshot: {e}");
                None
            }
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn has_today(&self) -> bool {
        self.get_today().is_some()
    }

    fn get_today(&self) -> Option<DailySnapshot> {
        self.read_snapshot().filter(|s| s.date == today())
    }

    fn save_today(&self, card: &DrawnCard, reading: &str) -> PortResult<()> {
        let snapshot = DailySnapshot {
            date: today(),
            card: card.clone(),
            reading: reading.to_string(),
        };
        self.write_slot(&self.snapshot_path(), &snapshot)
    }

    fn append_today(&self, reading: &str) -> PortResult<()> {
        match self.get_today() {
            Some(mut snapshot) => {
                snapshot.reading = reading.to_string();
                self.write_slot(&self.snapshot_path(), &snapshot)
            }
            // The slot was reset or rolled over mid-stream; dropping the
            // update is correct, yesterday's text must not resurrect.
            None => Ok(()),
        }
    }

    fn load_player_prefs(&self) -> PlayerPrefs {
        let Ok(raw) = fs::read_to_string(self.prefs_path()) else {
            return PlayerPrefs::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Discarding unreadable player prefs: {e}");
            PlayerPrefs::default()
        })
    }

    fn save_player_prefs(&self, prefs: &PlayerPrefs) -> PortResult<()> {
        self.write_slot(&self.prefs_path(), prefs)
    }
}
