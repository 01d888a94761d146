//! Tests for shared core types.

use super::*;

mod timestamp_tests {
    use super::*;

    #[test]
    fn test_from_rfc3339_normalises_offsets() {
        let a = Timestamp::from_rfc3339("2024-05-01T12:00:00+02:00").unwrap();
        let b = Timestamp::from_rfc3339("2024-05-01T10:00:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_rfc3339_rejects_garbage() {
        let result = Timestamp::from_rfc3339("yesterday");
        assert!(matches!(result, Err(ParseError::InvalidFormat { .. })));
    }

    /// Epoch values are accepted in seconds or milliseconds.
    #[test]
    fn test_from_epoch_seconds_and_millis() {
        let seconds = Timestamp::from_epoch(1_714_564_800).unwrap();
        let millis = Timestamp::from_epoch(1_714_564_800_000).unwrap();
        assert_eq!(seconds, millis);
        assert_eq!(seconds.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_ordering_follows_time() {
        let earlier = Timestamp::from_rfc3339("2024-05-01T10:00:00Z").unwrap();
        let later = Timestamp::from_rfc3339("2024-05-01T10:00:01Z").unwrap();
        assert!(earlier < later);
    }
}

mod correlation_id_tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }

    #[test]
    fn test_parse_round_trips_display() {
        let id = CorrelationId::new();
        let parsed: CorrelationId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_rejects_non_uuid() {
        assert!("not-a-uuid".parse::<CorrelationId>().is_err());
    }
}
