//! In-memory contact directory for unit tests.

use async_trait::async_trait;
use directory_client::{ApiError, Contact, ContactId, ContactPage, NoteReceipt, SearchParam};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::contacts::ContactDirectory;

/// Build a contact from a JSON object literal.
pub(crate) fn contact(value: Value) -> Contact {
    match value {
        Value::Object(fields) => Contact::from_fields(fields),
        other => panic!("expected object, got {other}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailPoint {
    Lookup,
    Search(SearchParam),
}

#[derive(Debug, Clone)]
pub(crate) enum NoteBehaviour {
    Accept,
    Reject { status: u16, body: String },
    Timeout,
}

/// Directory fake that serves fixed records and records every call.
pub(crate) struct FakeDirectory {
    lookup: Vec<Contact>,
    search: HashMap<SearchParam, Vec<Contact>>,
    fail_on: Option<FailPoint>,
    note_behaviour: NoteBehaviour,
    calls: Mutex<Vec<String>>,
    notes: Mutex<Vec<(ContactId, String, Option<String>)>>,
}

impl FakeDirectory {
    pub(crate) fn new() -> Self {
        Self {
            lookup: Vec::new(),
            search: HashMap::new(),
            fail_on: None,
            note_behaviour: NoteBehaviour::Accept,
            calls: Mutex::new(Vec::new()),
            notes: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_lookup(mut self, contacts: Vec<Contact>) -> Self {
        self.lookup = contacts;
        self
    }

    pub(crate) fn with_search(mut self, param: SearchParam, contacts: Vec<Contact>) -> Self {
        self.search.insert(param, contacts);
        self
    }

    pub(crate) fn failing_on(mut self, point: FailPoint) -> Self {
        self.fail_on = Some(point);
        self
    }

    pub(crate) fn with_note_behaviour(mut self, behaviour: NoteBehaviour) -> Self {
        self.note_behaviour = behaviour;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn notes(&self) -> Vec<(ContactId, String, Option<String>)> {
        self.notes.lock().unwrap().clone()
    }

    fn unavailable() -> ApiError {
        ApiError::HttpError {
            status: 503,
            message: "directory unavailable".to_string(),
        }
    }
}

#[async_trait]
impl ContactDirectory for FakeDirectory {
    async fn lookup_by_email(&self, email: &str) -> Result<ContactPage, ApiError> {
        self.calls.lock().unwrap().push(format!("lookup {email}"));
        if self.fail_on == Some(FailPoint::Lookup) {
            return Err(Self::unavailable());
        }
        Ok(ContactPage {
            url: format!("https://directory.test/contacts?emailAddress={email}"),
            contacts: self.lookup.clone(),
        })
    }

    async fn search_contacts(
        &self,
        param: SearchParam,
        value: &str,
        offset: u32,
        limit: u32,
    ) -> Result<ContactPage, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("search {param} {value} {offset} {limit}"));
        if self.fail_on == Some(FailPoint::Search(param)) {
            return Err(Self::unavailable());
        }
        let contacts = self
            .search
            .get(&param)
            .map(|all| {
                all.iter()
                    .skip(offset as usize)
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(ContactPage {
            url: format!(
                "https://directory.test/contacts/search?{param}={value}&offsetRows={offset}&displayLength={limit}"
            ),
            contacts,
        })
    }

    async fn create_note(
        &self,
        contact_id: &ContactId,
        note: &str,
        note_type_id: Option<&str>,
    ) -> Result<NoteReceipt, ApiError> {
        self.calls.lock().unwrap().push(format!("note {contact_id}"));
        self.notes.lock().unwrap().push((
            contact_id.clone(),
            note.to_string(),
            note_type_id.map(str::to_string),
        ));
        match &self.note_behaviour {
            NoteBehaviour::Accept => Ok(NoteReceipt {
                status: 200,
                body: None,
            }),
            NoteBehaviour::Reject { status, body } => Err(ApiError::HttpError {
                status: *status,
                message: body.clone(),
            }),
            NoteBehaviour::Timeout => Err(ApiError::Timeout),
        }
    }
}
