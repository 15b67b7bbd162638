//! Retrieval cursor
//!
//! The cursor is the publish time of the newest record the engine is done
//! with. A record is new iff its key sorts after the cursor. The loop only
//! ever moves the cursor forward; the one exception is the reset chosen at
//! startup.

use sdk::errors::EngineError;
use sdk::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::write_atomic;

/// File name of the cursor inside the data directory
pub const CURSOR_FILE: &str = "last_retrieved_time.json";

/// How the cursor is initialized when the engine starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Reset to the beginning: the current latest record is acted on
    CatchUp,

    /// Reset to the current local time: only later records are acted on
    FromNow,

    /// Keep whatever was persisted
    Resume,
}

impl StartMode {
    /// Interpret an answer to "Do you want to take attendance now? (y/[n])".
    pub fn from_prompt_answer(answer: &str) -> Self {
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => StartMode::CatchUp,
            _ => StartMode::FromNow,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorDocument {
    #[serde(rename = "Last Retrieved Time")]
    last_retrieved: Timestamp,
}

/// Durable, monotonic pointer to the last record acted on
#[derive(Debug)]
pub struct Cursor {
    path: PathBuf,
    last_acted_on: Timestamp,
}

impl Cursor {
    /// Open the cursor file in `data_dir` without touching it.
    ///
    /// A missing file yields `sentinel`.
    pub fn load(data_dir: &Path, sentinel: Timestamp) -> Result<Self, EngineError> {
        let path = data_dir.join(CURSOR_FILE);

        let last_acted_on = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|e| {
                EngineError::State(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let doc: CursorDocument = serde_json::from_str(&contents).map_err(|e| {
                EngineError::State(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            doc.last_retrieved
        } else {
            sentinel
        };

        Ok(Self {
            path,
            last_acted_on,
        })
    }

    /// Open the cursor and apply the startup mode, persisting the result.
    pub fn open(data_dir: &Path, mode: StartMode) -> Result<Self, EngineError> {
        let mut cursor = Self::load(data_dir, Timestamp::beginning())?;

        match mode {
            StartMode::CatchUp => cursor.reset(Timestamp::beginning())?,
            StartMode::FromNow => cursor.reset(Timestamp::now())?,
            StartMode::Resume => {}
        }

        tracing::info!(
            "Cursor at {} ({:?}), stored in {}",
            cursor.last_acted_on,
            mode,
            cursor.path.display()
        );
        Ok(cursor)
    }

    pub fn last_acted_on(&self) -> &Timestamp {
        &self.last_acted_on
    }

    /// Whether a record published at `key` has not been acted on yet.
    pub fn is_new(&self, key: &Timestamp) -> bool {
        *key > self.last_acted_on
    }

    /// Move the cursor forward to `key` and persist it.
    ///
    /// Returns `false` (and writes nothing) when `key` does not sort after the
    /// current position.
    pub fn advance(&mut self, key: &Timestamp) -> Result<bool, EngineError> {
        if !self.is_new(key) {
            tracing::debug!(
                "Cursor stays at {} (offered {})",
                self.last_acted_on,
                key
            );
            return Ok(false);
        }

        self.save(key)?;
        self.last_acted_on = key.clone();
        tracing::debug!("Cursor advanced to {}", key);
        Ok(true)
    }

    /// Overwrite the cursor unconditionally. Startup only.
    pub fn reset(&mut self, to: Timestamp) -> Result<(), EngineError> {
        self.save(&to)?;
        self.last_acted_on = to;
        Ok(())
    }

    fn save(&self, key: &Timestamp) -> Result<(), EngineError> {
        let doc = CursorDocument {
            last_retrieved: key.clone(),
        };
        let json = serde_json::to_vec_pretty(&doc)
            .map_err(|e| EngineError::State(format!("Failed to serialize cursor: {}", e)))?;
        write_atomic(&self.path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse(raw).unwrap()
    }

    #[test]
    fn test_missing_file_yields_sentinel() {
        let dir = TempDir::new().unwrap();
        let cursor = Cursor::load(dir.path(), Timestamp::beginning()).unwrap();

        assert!(cursor.last_acted_on().is_beginning());
        assert!(cursor.is_new(&ts("2024-01-01 10:00:05")));
    }

    #[test]
    fn test_advance_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let mut cursor = Cursor::load(dir.path(), Timestamp::beginning()).unwrap();

        assert!(cursor.advance(&ts("2024-01-01 10:00:05")).unwrap());
        assert!(!cursor.advance(&ts("2024-01-01 09:00:00")).unwrap());
        assert!(!cursor.advance(&ts("2024-01-01 10:00:05")).unwrap());
        assert_eq!(cursor.last_acted_on(), &ts("2024-01-01 10:00:05"));
    }

    #[test]
    fn test_advance_persists() {
        let dir = TempDir::new().unwrap();
        let mut cursor = Cursor::load(dir.path(), Timestamp::beginning()).unwrap();
        cursor.advance(&ts("2024-01-01 10:00:05")).unwrap();

        let contents = fs::read_to_string(dir.path().join(CURSOR_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["Last Retrieved Time"], "2024-01-01 10:00:05");

        let reopened = Cursor::open(dir.path(), StartMode::Resume).unwrap();
        assert_eq!(reopened.last_acted_on(), &ts("2024-01-01 10:00:05"));
    }

    #[test]
    fn test_catch_up_resets_to_beginning() {
        let dir = TempDir::new().unwrap();
        let mut cursor = Cursor::load(dir.path(), Timestamp::beginning()).unwrap();
        cursor.advance(&ts("2024-01-01 10:00:05")).unwrap();

        let cursor = Cursor::open(dir.path(), StartMode::CatchUp).unwrap();
        assert!(cursor.last_acted_on().is_beginning());
    }

    #[test]
    fn test_prompt_answers() {
        assert_eq!(StartMode::from_prompt_answer("y"), StartMode::CatchUp);
        assert_eq!(StartMode::from_prompt_answer(" Y\n"), StartMode::CatchUp);
        assert_eq!(StartMode::from_prompt_answer(""), StartMode::FromNow);
        assert_eq!(StartMode::from_prompt_answer("n"), StartMode::FromNow);
    }
}
