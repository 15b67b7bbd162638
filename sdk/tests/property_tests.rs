use proptest::prelude::*;
use sdk::errors::{AttendanceError, AttendantErrorExt, EngineError};
use sdk::types::{normalize_choice, Timestamp};

// Every error variant yields a non-empty hint that never echoes the raw
// payload (which may carry URLs, selectors, or server responses).
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "internal-[a-z0-9/_.:]{8,32}") {
        let engine_errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::State(error_str.clone()),
            EngineError::KeyringError(error_str.clone()),
            EngineError::Network(error_str.clone()),
            EngineError::DriverLost(error_str.clone()),
        ];
        for err in engine_errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&error_str));
        }

        let attendance_errs = vec![
            AttendanceError::Transient(error_str.clone()),
            AttendanceError::AuthenticationRequired(error_str.clone()),
            AttendanceError::AnswerFailed(error_str.clone()),
            AttendanceError::MalformedRecord(error_str.clone()),
            AttendanceError::SessionLost(error_str.clone()),
            AttendanceError::CursorWrite(error_str.clone()),
            AttendanceError::JoinFailed { session_id: "A1".to_string(), reason: error_str.clone() },
        ];
        for err in attendance_errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&error_str));
        }
    }
}

// String order of store keys must agree with chronological order.
proptest! {
    #[test]
    fn test_timestamp_order_matches_chronology(
        a in 0i64..4_000_000_000i64,
        b in 0i64..4_000_000_000i64,
    ) {
        let fmt = |secs: i64| {
            chrono::DateTime::from_timestamp(secs, 0)
                .expect("in range")
                .naive_utc()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        };
        let ta = Timestamp::parse(&fmt(a)).expect("valid key");
        let tb = Timestamp::parse(&fmt(b)).expect("valid key");

        prop_assert_eq!(ta.cmp(&tb), a.cmp(&b));
        prop_assert!(ta > Timestamp::beginning());
    }
}

// Numerals 1..=26 and letters normalize onto the same alphabet.
proptest! {
    #[test]
    fn test_normalize_choice_numerals(n in 1u8..=26) {
        let letter = (b'a' + n - 1) as char;
        prop_assert_eq!(normalize_choice(&n.to_string()), Some(letter));
        prop_assert_eq!(normalize_choice(&letter.to_ascii_uppercase().to_string()), Some(letter));
    }
}
