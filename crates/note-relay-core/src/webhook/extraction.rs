//! # Event Data Extraction
//!
//! Helpdesk payloads vary by event type and API version. Each field of
//! [`CanonicalEventData`] is read through an ordered table of named rules;
//! the first rule that yields a value wins and its name is kept for logs.
//! Rules are plain functions over the event JSON, so adding a location means
//! adding one table entry.

use serde::Serialize;
use serde_json::Value;

use super::html::html_to_text;
use crate::Timestamp;

/// Subject used when the payload has none.
pub const DEFAULT_SUBJECT: &str = "(no subject)";

/// A named extraction rule.
#[derive(Clone, Copy)]
pub struct ExtractionRule {
    pub name: &'static str,
    pub extract: fn(&Value) -> Option<String>,
}

impl std::fmt::Debug for ExtractionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

const fn rule(name: &'static str, extract: fn(&Value) -> Option<String>) -> ExtractionRule {
    ExtractionRule { name, extract }
}

/// Normalised view of one webhook event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalEventData {
    /// Trimmed customer email address
    pub customer_email: Option<String>,
    /// Conversation subject, never empty
    pub subject: String,
    /// Plain-text message body, empty when none was found
    pub body_text: String,
    pub conversation_id: Option<String>,
    pub agent_name: Option<String>,
    pub inbox_label: Option<String>,
    /// Rule that produced the email
    pub email_source: Option<&'static str>,
    /// Rule that produced the body
    pub body_source: Option<&'static str>,
}

// ============================================================================
// Rule Tables
// ============================================================================

/// Customer email locations, most specific first.
pub const EMAIL_RULES: &[ExtractionRule] = &[
    rule("contactInfo.email", |v| email_at(v, &["contactInfo", "email"])),
    rule("contact.email", |v| email_at(v, &["contact", "email"])),
    rule("customer.email", |v| email_at(v, &["customer", "email"])),
    rule("primaryCustomer.email", |v| email_at(v, &["primaryCustomer", "email"])),
    rule("conversation.customer.email", |v| {
        email_at(v, &["conversation", "customer", "email"])
    }),
    rule("conversation.contact.email", |v| {
        email_at(v, &["conversation", "contact", "email"])
    }),
    rule("conversation.primaryCustomer.email", |v| {
        email_at(v, &["conversation", "primaryCustomer", "email"])
    }),
    rule("customer.emails[0]", first_listed_customer_email),
    rule("thread.to[0]", outbound_recipient),
];

pub const SUBJECT_RULES: &[ExtractionRule] = &[
    rule("subject", |v| text_at(v, &["subject"])),
    rule("conversation.subject", |v| text_at(v, &["conversation", "subject"])),
    rule("ticket.subject", |v| text_at(v, &["ticket", "subject"])),
];

pub const CONVERSATION_ID_RULES: &[ExtractionRule] = &[
    rule("conversationId", |v| text_at(v, &["conversationId"])),
    rule("conversation.id", |v| text_at(v, &["conversation", "id"])),
    rule("id", |v| text_at(v, &["id"])),
    rule("conversation.number", |v| text_at(v, &["conversation", "number"])),
    rule("number", |v| text_at(v, &["number"])),
];

pub const AGENT_RULES: &[ExtractionRule] = &[
    rule("thread.createdBy", |v| outbound_thread(v).and_then(|t| person_name(t.get("createdBy")?))),
    rule("thread.author", |v| outbound_thread(v).and_then(|t| person_name(t.get("author")?))),
    rule("agent", |v| person_name(v.get("agent")?)),
    rule("user", |v| person_name(v.get("user")?)),
    rule("assignee", |v| person_name(v.get("assignee")?)),
];

pub const INBOX_RULES: &[ExtractionRule] = &[
    rule("mailbox.name", |v| text_at(v, &["mailbox", "name"])),
    rule("mailboxName", |v| text_at(v, &["mailboxName"])),
    rule("inbox.name", |v| text_at(v, &["inbox", "name"])),
    rule("conversation.mailbox.name", |v| text_at(v, &["conversation", "mailbox", "name"])),
    rule("mailbox.email", |v| text_at(v, &["mailbox", "email"])),
];

/// Body locations: the selected outbound thread first, then top-level
/// fields, then previews.
pub const BODY_RULES: &[ExtractionRule] = &[
    rule("thread.textBody", |v| outbound_thread(v).and_then(|t| text_at(t, &["textBody"]))),
    rule("thread.text", |v| outbound_thread(v).and_then(|t| text_at(t, &["text"]))),
    rule("thread.body", |v| outbound_thread(v).and_then(|t| html_at(t, &["body"]))),
    rule("thread.htmlBody", |v| outbound_thread(v).and_then(|t| html_at(t, &["htmlBody"]))),
    rule("textBody", |v| text_at(v, &["textBody"])),
    rule("text", |v| text_at(v, &["text"])),
    rule("body", |v| html_at(v, &["body"])),
    rule("htmlBody", |v| html_at(v, &["htmlBody"])),
    rule("message", |v| html_at(v, &["message"])),
    rule("conversation.preview", |v| text_at(v, &["conversation", "preview"])),
    rule("preview", |v| text_at(v, &["preview"])),
];

// ============================================================================
// Extraction
// ============================================================================

/// The event object: `data` when the payload wraps it, else the payload.
pub fn event_root(payload: &Value) -> &Value {
    match payload.get("data") {
        Some(data) if data.is_object() => data,
        _ => payload,
    }
}

/// Run a rule table and return the first value with the rule name.
pub fn first_match(rules: &[ExtractionRule], root: &Value) -> Option<(String, &'static str)> {
    rules
        .iter()
        .find_map(|rule| (rule.extract)(root).map(|value| (value, rule.name)))
}

/// Extract the canonical event data from a parsed payload.
///
/// Never fails: missing fields are `None`, the subject falls back to
/// [`DEFAULT_SUBJECT`] and the body to an empty string.
pub fn extract_event(payload: &Value) -> CanonicalEventData {
    let root = event_root(payload);

    let (customer_email, email_source) = split(first_match(EMAIL_RULES, root));
    let (body_text, body_source) = split(first_match(BODY_RULES, root));

    CanonicalEventData {
        customer_email,
        subject: first_match(SUBJECT_RULES, root)
            .map(|(subject, _)| subject)
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
        body_text: body_text.unwrap_or_default(),
        conversation_id: first_match(CONVERSATION_ID_RULES, root).map(|(id, _)| id),
        agent_name: first_match(AGENT_RULES, root).map(|(name, _)| name),
        inbox_label: first_match(INBOX_RULES, root).map(|(label, _)| label),
        email_source,
        body_source,
    }
}

fn split(found: Option<(String, &'static str)>) -> (Option<String>, Option<&'static str>) {
    match found {
        Some((value, source)) => (Some(value), Some(source)),
        None => (None, None),
    }
}

// ============================================================================
// Thread Selection
// ============================================================================

const OUTBOUND_DIRECTIONS: &[&str] = &["outbound", "out", "sent", "agent", "outgoing"];
const EMAIL_THREAD_TYPES: &[&str] = &["email", "message"];

/// Thread array, wherever the payload keeps it.
pub fn threads(root: &Value) -> Option<&Vec<Value>> {
    root.get("threads")
        .or_else(|| root.get("conversation").and_then(|c| c.get("threads")))
        .or_else(|| root.get("_embedded").and_then(|e| e.get("threads")))
        .and_then(Value::as_array)
}

/// Most recent outbound email thread.
///
/// Recency is the thread timestamp; threads without one rank below those
/// with one, and ties (including no timestamps at all) go to the later
/// array position.
pub fn outbound_thread(root: &Value) -> Option<&Value> {
    threads(root)?
        .iter()
        .enumerate()
        .filter(|(_, thread)| is_outbound_email(thread))
        .max_by_key(|(index, thread)| (thread_timestamp(thread), *index))
        .map(|(_, thread)| thread)
}

/// Whether a thread is an email written by an agent.
pub fn is_outbound_email(thread: &Value) -> bool {
    let is_email = lowercase_at(thread, &["type"])
        .is_some_and(|kind| EMAIL_THREAD_TYPES.contains(&kind.as_str()));
    if !is_email {
        return false;
    }

    if let Some(direction) = lowercase_at(thread, &["direction"]) {
        return OUTBOUND_DIRECTIONS.contains(&direction.as_str());
    }

    lowercase_at(thread, &["createdBy", "type"]).as_deref() == Some("user")
        || lowercase_at(thread, &["source", "via"]).as_deref() == Some("user")
}

fn thread_timestamp(thread: &Value) -> Option<Timestamp> {
    ["createdAt", "created_at", "timestamp"]
        .iter()
        .find_map(|key| match thread.get(*key)? {
            Value::String(s) => Timestamp::from_rfc3339(s).ok(),
            Value::Number(n) => Timestamp::from_epoch(n.as_i64()?),
            _ => None,
        })
}

fn outbound_recipient(root: &Value) -> Option<String> {
    let recipient = outbound_thread(root)?.get("to")?.as_array()?.first()?;
    match recipient {
        Value::String(s) => normalize_email(s),
        Value::Object(_) => email_at(recipient, &["email"]),
        _ => None,
    }
}

fn first_listed_customer_email(root: &Value) -> Option<String> {
    let first = root.get("customer")?.get("emails")?.as_array()?.first()?;
    match first {
        Value::String(s) => normalize_email(s),
        Value::Object(_) => email_at(first, &["value"]).or_else(|| email_at(first, &["email"])),
        _ => None,
    }
}

// ============================================================================
// Value Helpers
// ============================================================================

fn value_at<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |value, key| value.get(*key))
}

/// Trimmed non-empty string, or a number rendered as text.
fn text_at(root: &Value, path: &[&str]) -> Option<String> {
    match value_at(root, path)? {
        Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn html_at(root: &Value, path: &[&str]) -> Option<String> {
    let raw = value_at(root, path)?.as_str()?;
    Some(html_to_text(raw)).filter(|text| !text.is_empty())
}

fn lowercase_at(root: &Value, path: &[&str]) -> Option<String> {
    value_at(root, path)?.as_str().map(|s| s.trim().to_lowercase())
}

fn email_at(root: &Value, path: &[&str]) -> Option<String> {
    normalize_email(value_at(root, path)?.as_str()?)
}

/// Trim an address and unwrap the `Name <address>` form.
pub fn normalize_email(raw: &str) -> Option<String> {
    let mut email = raw.trim();
    if let (Some(open), Some(close)) = (email.rfind('<'), email.rfind('>')) {
        if open < close {
            email = email[open + 1..close].trim();
        }
    }
    email
        .contains('@')
        .then(|| email.to_string())
}

fn person_name(person: &Value) -> Option<String> {
    match person {
        Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        Value::Object(_) => {
            let first = text_at(person, &["first"]).or_else(|| text_at(person, &["firstName"]));
            let last = text_at(person, &["last"]).or_else(|| text_at(person, &["lastName"]));
            match (first, last) {
                (Some(first), Some(last)) => Some(format!("{first} {last}")),
                (Some(name), None) | (None, Some(name)) => Some(name),
                (None, None) => text_at(person, &["name"]).or_else(|| text_at(person, &["email"])),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "extraction_tests.rs"]
mod tests;
