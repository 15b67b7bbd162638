//! Per-record session state tracking and answer confirmation rules

use sdk::types::{AnswerRecord, QuestionType, SessionState};
use tracing::debug;

/// Move `state` to `next`, logging the transition.
pub(crate) fn enter(state: &mut SessionState, next: SessionState) {
    debug!("{} -> {}", state, next);
    *state = next;
}

/// Whether the answer the session shows matches what was submitted.
///
/// Free text must match as a whole, ignoring case and surrounding blanks.
/// The session renders a chosen option with surrounding decoration, so a
/// multiple-choice letter only has to appear as a word of its own.
pub fn answer_confirmed(record: &AnswerRecord, shown: &str) -> bool {
    let shown = shown.trim().to_lowercase();
    let expected = record.answer.trim().to_lowercase();

    match record.question_type {
        QuestionType::FreeText => shown == expected,
        QuestionType::MultipleChoice => {
            !expected.is_empty()
                && shown
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|word| word == expected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::types::Timestamp;

    fn record(question_type: QuestionType, answer: &str) -> AnswerRecord {
        AnswerRecord::new(
            Timestamp::parse("2024-01-01 10:00:00").unwrap(),
            "A1",
            question_type,
            answer,
        )
    }

    #[test]
    fn test_free_text_ignores_case() {
        let rec = record(QuestionType::FreeText, "Present");
        assert!(answer_confirmed(&rec, "present "));
        assert!(!answer_confirmed(&rec, "Present!"));
    }

    #[test]
    fn test_choice_by_containment() {
        let rec = record(QuestionType::MultipleChoice, "b");
        assert!(answer_confirmed(&rec, "Your answer: B"));
        assert!(answer_confirmed(&rec, "(B)"));
        assert!(!answer_confirmed(&rec, "Your answer: C"));

        let rec = record(QuestionType::MultipleChoice, "a");
        assert!(!answer_confirmed(&rec, "Your answer: C"));
        assert!(!answer_confirmed(&rec, "Submitted"));
    }

    #[test]
    fn test_enter_updates_state() {
        let mut state = SessionState::Idle;
        enter(&mut state, SessionState::Joining);
        assert_eq!(state, SessionState::Joining);
    }
}
