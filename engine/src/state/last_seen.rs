use sdk::errors::EngineError;
use sdk::types::AnswerRecord;
use std::fs;
use std::path::{Path, PathBuf};

use super::write_atomic;

/// File name of the last-seen record inside the data directory
pub const LAST_SEEN_FILE: &str = "last_seen_record.json";

/// Mirror of the most recently fetched record
#[derive(Debug, Clone)]
pub struct LastSeenFile {
    path: PathBuf,
}

impl LastSeenFile {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(LAST_SEEN_FILE),
        }
    }

    pub fn record(&self, record: &AnswerRecord) -> Result<(), EngineError> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| EngineError::State(format!("Failed to serialize record: {}", e)))?;
        write_atomic(&self.path, &json)
    }

    /// The last recorded record, if any.
    pub fn load(&self) -> Result<Option<AnswerRecord>, EngineError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            EngineError::State(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let record = serde_json::from_str(&contents).map_err(|e| {
            EngineError::State(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::types::{QuestionType, Timestamp};
    use tempfile::TempDir;

    #[test]
    fn test_record_and_load() {
        let dir = TempDir::new().unwrap();
        let file = LastSeenFile::new(dir.path());
        assert!(file.load().unwrap().is_none());

        let record = AnswerRecord::new(
            Timestamp::parse("2024-01-01 10:00:00").unwrap(),
            "A1",
            QuestionType::FreeText,
            "here",
        );
        file.record(&record).unwrap();

        assert_eq!(file.load().unwrap(), Some(record));
        let raw = fs::read_to_string(dir.path().join(LAST_SEEN_FILE)).unwrap();
        assert!(raw.contains("\"Question Type\": \"typing\""));
    }
}
