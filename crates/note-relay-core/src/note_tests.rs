//! Tests for note composition and writing.

use super::*;
use crate::testing::{FakeDirectory, NoteBehaviour};

fn event() -> CanonicalEventData {
    CanonicalEventData {
        customer_email: Some("a@x.com".to_string()),
        subject: "Invoice question".to_string(),
        body_text: "Hi Ann,\nThe invoice is attached.".to_string(),
        conversation_id: Some("123".to_string()),
        agent_name: Some("Bo Agent".to_string()),
        inbox_label: Some("Billing".to_string()),
        ..CanonicalEventData::default()
    }
}

mod composer {
    use super::*;

    #[test]
    fn test_header_blank_line_then_body() {
        let note = NoteComposer::default().compose(&event());
        assert_eq!(
            note,
            "Helpdesk email sent\n\
             Conversation: 123\n\
             To: a@x.com\n\
             Subject: Invoice question\n\
             Agent: Bo Agent\n\
             Inbox: Billing\n\
             \n\
             Hi Ann,\nThe invoice is attached."
        );
    }

    #[test]
    fn test_optional_lines_are_omitted() {
        let data = CanonicalEventData {
            subject: "Hello".to_string(),
            body_text: "Body".to_string(),
            ..CanonicalEventData::default()
        };
        assert_eq!(
            NoteComposer::default().compose(&data),
            "Helpdesk email sent\nSubject: Hello\n\nBody"
        );
    }

    /// The recipient line sits between the conversation and the subject.
    #[test]
    fn test_recipient_follows_conversation() {
        let data = CanonicalEventData {
            customer_email: Some("a@x.com".to_string()),
            subject: "Re: Order".to_string(),
            conversation_id: Some("42".to_string()),
            ..CanonicalEventData::default()
        };
        assert_eq!(
            NoteComposer::default().compose(&data),
            "Helpdesk email sent\nConversation: 42\nTo: a@x.com\nSubject: Re: Order\n\n(no body)"
        );
    }

    #[test]
    fn test_recipient_without_conversation() {
        let data = CanonicalEventData {
            customer_email: Some("a@x.com".to_string()),
            subject: "Hello".to_string(),
            body_text: "Body".to_string(),
            ..CanonicalEventData::default()
        };
        assert_eq!(
            NoteComposer::default().compose(&data),
            "Helpdesk email sent\nTo: a@x.com\nSubject: Hello\n\nBody"
        );
    }

    #[test]
    fn test_empty_body_uses_placeholder() {
        let data = CanonicalEventData {
            body_text: "  \n ".to_string(),
            ..event()
        };
        assert!(NoteComposer::default().compose(&data).ends_with("\n\n(no body)"));
    }

    /// The note never exceeds the limit, counted in characters.
    #[test]
    fn test_truncates_to_character_limit() {
        let data = CanonicalEventData {
            body_text: "é".repeat(100_000),
            ..event()
        };
        let note = NoteComposer::default().compose(&data);
        assert_eq!(note.chars().count(), DEFAULT_MAX_NOTE_LENGTH);
        assert!(note.starts_with(NOTE_HEADING));
    }

    #[test]
    fn test_short_note_is_untouched() {
        let note = NoteComposer::new(10_000).compose(&event());
        assert!(note.ends_with("attached."));
    }

    #[test]
    fn test_truncate_chars_boundaries() {
        assert_eq!(truncate_chars("héllo".to_string(), 2), "hé");
        assert_eq!(truncate_chars("héllo".to_string(), 5), "héllo");
        assert_eq!(truncate_chars("héllo".to_string(), 50), "héllo");
        assert_eq!(truncate_chars("héllo".to_string(), 0), "");
    }
}

mod writer {
    use super::*;

    #[tokio::test]
    async fn test_write_passes_note_and_type() {
        let directory = Arc::new(FakeDirectory::new());
        let writer = NoteWriter::new(directory.clone(), Some("88".to_string()));

        let receipt = writer.write(&ContactId::new("42"), "the note").await.unwrap();

        assert_eq!(receipt.status, 200);
        assert_eq!(
            directory.notes(),
            vec![(
                ContactId::new("42"),
                "the note".to_string(),
                Some("88".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_blank_note_type_is_not_sent() {
        let directory = Arc::new(FakeDirectory::new());
        let writer = NoteWriter::new(directory.clone(), Some("  ".to_string()));

        writer.write(&ContactId::new("42"), "note").await.unwrap();

        assert_eq!(directory.notes()[0].2, None);
    }

    #[tokio::test]
    async fn test_rejection_keeps_status_and_body() {
        let directory = Arc::new(FakeDirectory::new().with_note_behaviour(NoteBehaviour::Reject {
            status: 422,
            body: "invalid contact".to_string(),
        }));
        let writer = NoteWriter::new(directory.clone(), None);

        let error = writer.write(&ContactId::new("42"), "note").await.unwrap_err();

        match error {
            NoteWriteError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "invalid contact");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(directory.notes().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let directory =
            Arc::new(FakeDirectory::new().with_note_behaviour(NoteBehaviour::Timeout));
        let writer = NoteWriter::new(directory, None);

        let error = writer.write(&ContactId::new("42"), "note").await.unwrap_err();

        assert!(matches!(error, NoteWriteError::Transport { .. }));
        assert_eq!(error.remote_status(), None);
    }
}
