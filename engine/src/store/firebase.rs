//! Firebase Realtime Database store
//!
//! Uses the database's REST convention: `GET {base_url}/{path}.json` returns
//! the JSON value at `path`, or `null` when nothing is stored there.
//!
//! Layout written by the publisher:
//! - `Last Updated Time` → `{"Last Updated Time": "2024-01-01 10:00:00"}`
//! - `2024-01-01 10:00:00` → `{"Session ID", "Question Type", "Ureply Answer"}`

use async_trait::async_trait;
use reqwest::Client;
use sdk::errors::EngineError;
use sdk::types::{normalize_choice, AnswerRecord, QuestionType, Timestamp};
use serde::Deserialize;
use std::time::Duration;

use super::{AnswerStore, Result, StoreError};

/// Firebase-backed answer store
#[derive(Debug, Clone)]
pub struct FirebaseStore {
    /// Database root URL, without a trailing slash
    base_url: String,

    /// Key holding the latest publish time
    last_key_path: String,

    /// HTTP client with the per-request timeout applied
    client: Client,
}

#[derive(Debug, Deserialize)]
struct LatestPointer {
    #[serde(rename = "Last Updated Time")]
    last_updated: String,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Session ID")]
    session_id: Option<String>,

    #[serde(rename = "Question Type")]
    question_type: Option<String>,

    #[serde(rename = "Ureply Answer")]
    answer: Option<serde_json::Value>,
}

impl FirebaseStore {
    /// Create a new store client
    ///
    /// # Arguments
    /// * `base_url` - Database root (e.g. "https://example-default-rtdb.firebaseio.com")
    /// * `last_key_path` - Key holding the latest publish time
    /// * `timeout` - Upper bound for each request
    pub fn new(
        base_url: impl Into<String>,
        last_key_path: impl Into<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            last_key_path: last_key_path.into(),
            client,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, urlencoding::encode(path))
    }

    /// GET a path and return its JSON value (`Value::Null` when absent).
    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = self.url_for(path);
        tracing::debug!("Store request: GET {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Transient(format!("request for '{}' timed out", path))
            } else if e.is_connect() {
                StoreError::Transient(format!("cannot connect to {}", self.base_url))
            } else {
                StoreError::Transient(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Transient(format!(
                "store returned {} for '{}': {}",
                status, path, error_text
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| StoreError::Transient(format!("unreadable response body: {}", e)))
    }
}

#[async_trait]
impl AnswerStore for FirebaseStore {
    async fn fetch_latest_key(&self) -> Result<Timestamp> {
        let value = self.get_json(&self.last_key_path).await?;
        if value.is_null() {
            return Err(StoreError::NotFound(self.last_key_path.clone()));
        }

        let pointer: LatestPointer = serde_json::from_value(value).map_err(|e| {
            StoreError::Transient(format!("latest key pointer is unreadable: {}", e))
        })?;

        Timestamp::parse(pointer.last_updated.trim()).map_err(StoreError::Transient)
    }

    async fn fetch_record(&self, key: &Timestamp) -> Result<AnswerRecord> {
        let value = self.get_json(key.as_str()).await?;
        if value.is_null() {
            return Err(StoreError::NotFound(key.as_str().to_string()));
        }

        decode_record(key, value)
    }
}

/// Turn a raw store value into an `AnswerRecord`, normalizing
/// multiple-choice answers to their option letter.
fn decode_record(key: &Timestamp, value: serde_json::Value) -> Result<AnswerRecord> {
    let malformed = |reason: String| StoreError::Malformed {
        key: key.as_str().to_string(),
        reason,
    };

    let raw: RawRecord =
        serde_json::from_value(value).map_err(|e| malformed(format!("not a record: {}", e)))?;

    let session_id = raw
        .session_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("missing 'Session ID'".to_string()))?;

    let type_name = raw
        .question_type
        .ok_or_else(|| malformed("missing 'Question Type'".to_string()))?;
    let question_type = QuestionType::from_wire(&type_name)
        .ok_or_else(|| malformed(format!("unknown question type '{}'", type_name)))?;

    // Publishers sometimes send numerals as JSON numbers
    let answer = match raw.answer {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(other) if !other.is_null() => {
            return Err(malformed(format!("unsupported answer value {}", other)))
        }
        _ => return Err(malformed("missing 'Ureply Answer'".to_string())),
    };

    let answer = match question_type {
        QuestionType::MultipleChoice => normalize_choice(&answer)
            .map(String::from)
            .ok_or_else(|| malformed(format!("'{}' is not a valid choice", answer)))?,
        QuestionType::FreeText => answer,
    };

    Ok(AnswerRecord::new(
        key.clone(),
        session_id,
        question_type,
        answer,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> Timestamp {
        Timestamp::parse("2024-01-01 10:00:00").unwrap()
    }

    #[test]
    fn test_url_percent_encodes_key() {
        let store =
            FirebaseStore::new("https://db.example.com/", "Last Updated Time", Duration::from_secs(1))
                .unwrap();

        assert_eq!(
            store.url_for("2024-01-01 10:00:00"),
            "https://db.example.com/2024-01-01%2010%3A00%3A00.json"
        );
        assert_eq!(
            store.url_for("Last Updated Time"),
            "https://db.example.com/Last%20Updated%20Time.json"
        );
    }

    #[test]
    fn test_decode_normalizes_numeral_choice() {
        let record = decode_record(
            &key(),
            json!({"Session ID": "A1", "Question Type": "mc", "Ureply Answer": "2"}),
        )
        .unwrap();

        assert_eq!(record.answer, "b");
        assert_eq!(record.choice(), Some('b'));
        assert_eq!(record.published_at, key());
    }

    #[test]
    fn test_decode_accepts_numeric_json_answer() {
        let record = decode_record(
            &key(),
            json!({"Session ID": "A1", "Question Type": "mc", "Ureply Answer": 3}),
        )
        .unwrap();

        assert_eq!(record.answer, "c");
    }

    #[test]
    fn test_decode_keeps_free_text_verbatim() {
        let record = decode_record(
            &key(),
            json!({"Session ID": "A1", "Question Type": "typing", "Ureply Answer": "Present, Sir"}),
        )
        .unwrap();

        assert_eq!(record.question_type, QuestionType::FreeText);
        assert_eq!(record.answer, "Present, Sir");
    }

    #[test]
    fn test_decode_rejects_bad_records() {
        let unknown_type = decode_record(
            &key(),
            json!({"Session ID": "A1", "Question Type": "essay", "Ureply Answer": "x"}),
        );
        assert!(matches!(unknown_type, Err(StoreError::Malformed { .. })));

        let bad_choice = decode_record(
            &key(),
            json!({"Session ID": "A1", "Question Type": "mc", "Ureply Answer": "42"}),
        );
        assert!(matches!(bad_choice, Err(StoreError::Malformed { .. })));

        let no_session = decode_record(
            &key(),
            json!({"Question Type": "mc", "Ureply Answer": "a"}),
        );
        assert!(matches!(no_session, Err(StoreError::Malformed { .. })));
    }
}
