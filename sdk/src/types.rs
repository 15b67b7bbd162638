//! Answer record and session state types
//!
//! Records in the store are keyed by their publish time. The key format is
//! fixed-width (`YYYY-MM-DD HH:MM:SS`) so that plain string comparison is the
//! same as chronological comparison; everything that decides "is this new?"
//! relies on that.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Format of every store key.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TIMESTAMP_LEN: usize = 19;

/// Publish time of an answer record, in the store's key format.
///
/// Ordering is lexicographic on the underlying string. The empty timestamp
/// is the "beginning of time" sentinel and sorts before every real key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// The "beginning of time" sentinel. Every published record is newer.
    pub fn beginning() -> Self {
        Self(String::new())
    }

    /// Current local time in the store's key format.
    pub fn now() -> Self {
        Self(chrono::Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    /// Parse a store key, rejecting anything that is not exactly
    /// `YYYY-MM-DD HH:MM:SS`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.len() != TIMESTAMP_LEN {
            return Err(format!(
                "timestamp '{}' is not in the fixed-width '{}' form",
                raw, TIMESTAMP_FORMAT
            ));
        }
        chrono::NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))?;
        Ok(Self(raw.to_string()))
    }

    /// Wrap a persisted value without validation. The empty string maps to
    /// the sentinel.
    pub fn from_persisted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_beginning(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<beginning>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Kind of question a record answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    /// A single lettered option (`"mc"` on the wire)
    #[serde(rename = "mc")]
    MultipleChoice,

    /// Typed text (`"typing"` on the wire)
    #[serde(rename = "typing")]
    FreeText,
}

impl QuestionType {
    pub fn wire_name(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "mc",
            QuestionType::FreeText => "typing",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mc" => Some(QuestionType::MultipleChoice),
            "typing" => Some(QuestionType::FreeText),
            _ => None,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// One published answer.
///
/// Field names on disk match the store's JSON so the last-seen file reads
/// like the record that was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(rename = "Published At")]
    pub published_at: Timestamp,

    #[serde(rename = "Session ID")]
    pub session_id: String,

    #[serde(rename = "Question Type")]
    pub question_type: QuestionType,

    #[serde(rename = "Ureply Answer")]
    pub answer: String,
}

impl AnswerRecord {
    pub fn new(
        published_at: Timestamp,
        session_id: impl Into<String>,
        question_type: QuestionType,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            published_at,
            session_id: session_id.into(),
            question_type,
            answer: answer.into(),
        }
    }

    /// The option letter for a multiple-choice record.
    ///
    /// Records are normalized when decoded from the store, so this only
    /// returns `None` for free-text records or hand-built records that skipped
    /// decoding.
    pub fn choice(&self) -> Option<char> {
        match self.question_type {
            QuestionType::MultipleChoice => {
                let mut chars = self.answer.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_lowercase()),
                    _ => None,
                }
            }
            QuestionType::FreeText => None,
        }
    }
}

/// Normalize a multiple-choice answer to its option letter.
///
/// Accepts a single letter in either case, or a numeral `1..=26` which maps
/// to `a..=z`. This is the publisher's contract; the engine applies it once,
/// when decoding a record from the store.
pub fn normalize_choice(raw: &str) -> Option<char> {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c.to_ascii_lowercase());
        }
    }

    match trimmed.parse::<u8>() {
        Ok(n @ 1..=26) => Some((b'a' + n - 1) as char),
        _ => None,
    }
}

/// States an answer record moves through while the engine acts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Authenticating,
    Joining,
    Answering,
    AwaitingOverride,
    Confirming,
    Committed,
    Failed,
}

impl SessionState {
    /// Whether the record's handling is over (the cursor may be considered).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Committed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Authenticating => "authenticating",
            SessionState::Joining => "joining",
            SessionState::Answering => "answering",
            SessionState::AwaitingOverride => "awaiting_override",
            SessionState::Confirming => "confirming",
            SessionState::Committed => "committed",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}
