// Contact lookup and search operations for the directory API

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::client::DirectoryClient;
use crate::error::ApiError;

/// Identifier of a directory contact.
///
/// The directory returns identifiers as JSON numbers on some endpoints and as
/// strings on others; both are normalised to their decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    /// Wrap an identifier value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A contact record as returned by the directory.
///
/// The record is kept as raw JSON; only the identifier and the email-bearing
/// fields are interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contact(Map<String, Value>);

impl Contact {
    /// Primary email field.
    pub const PRIMARY_EMAIL_FIELD: &'static str = "EMAILADDRESS";

    /// Alternate email field.
    pub const ALTERNATE_EMAIL_FIELD: &'static str = "EMAILADDRESSALTERNATIVE";

    const ID_FIELDS: &'static [&'static str] = &["CONTACTID", "contactID", "contactId", "id"];

    /// Build a contact from raw record fields.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Raw record fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The contact identifier, if the record carries one.
    pub fn contact_id(&self) -> Option<ContactId> {
        Self::ID_FIELDS.iter().find_map(|key| match self.0.get(*key)? {
            Value::String(s) if !s.trim().is_empty() => Some(ContactId::new(s.trim())),
            Value::Number(n) => Some(ContactId::new(n.to_string())),
            _ => None,
        })
    }

    /// Email-bearing fields as `(field name, value)` pairs.
    ///
    /// Order is fixed: primary, alternate, then every other string field whose
    /// name contains `EMAIL` (custom fields) in record order. Empty values are
    /// skipped.
    pub fn email_fields(&self) -> Vec<(&str, &str)> {
        let mut fields = Vec::new();

        for key in [Self::PRIMARY_EMAIL_FIELD, Self::ALTERNATE_EMAIL_FIELD] {
            if let Some(value) = self.string_field(key) {
                fields.push((key, value));
            }
        }

        for (key, value) in &self.0 {
            if key == Self::PRIMARY_EMAIL_FIELD || key == Self::ALTERNATE_EMAIL_FIELD {
                continue;
            }
            if !key.to_ascii_uppercase().contains("EMAIL") {
                continue;
            }
            if let Some(value) = value.as_str().map(str::trim).filter(|v| !v.is_empty()) {
                fields.push((key.as_str(), value));
            }
        }

        fields
    }

    /// Name of the first email field equal to `target`, ignoring case and
    /// surrounding whitespace.
    pub fn matching_email_field(&self, target: &str) -> Option<&str> {
        let target = target.trim().to_lowercase();
        if target.is_empty() {
            return None;
        }

        self.email_fields()
            .into_iter()
            .find(|(_, value)| value.to_lowercase() == target)
            .map(|(key, _)| key)
    }

    /// Whether any email field equals `target` case-insensitively.
    pub fn matches_email(&self, target: &str) -> bool {
        self.matching_email_field(target).is_some()
    }

    fn string_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Query parameter used for free-text contact search.
///
/// Variants are ordered from most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchParam {
    /// Dedicated email parameter (`emailAddress`)
    EmailAddress,
    /// Generic query parameter (`q`)
    Query,
    /// Generic search parameter (`search`)
    Search,
}

impl SearchParam {
    /// All parameters in escalation order.
    pub const ESCALATION: [SearchParam; 3] = [Self::EmailAddress, Self::Query, Self::Search];

    /// Query-string key sent to the directory.
    pub fn as_query_key(&self) -> &'static str {
        match self {
            Self::EmailAddress => "emailAddress",
            Self::Query => "q",
            Self::Search => "search",
        }
    }
}

impl std::fmt::Display for SearchParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_query_key())
    }
}

/// One page of contacts plus the URL that produced it.
#[derive(Debug, Clone, Default)]
pub struct ContactPage {
    /// Requested URL, without credentials
    pub url: String,
    /// Contact records in the order the directory returned them
    pub contacts: Vec<Contact>,
}

impl DirectoryClient {
    /// Look up contacts by exact email address.
    ///
    /// Issues `GET {base}/contacts?emailAddress=<email>`. The directory may
    /// apply its own partial matching, so callers must still check which
    /// record actually carries the address.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the URL cannot be built, the request fails, the
    /// directory answers with a non-success status other than 404, or the
    /// body is not JSON.
    pub async fn lookup_by_email(&self, email: &str) -> Result<ContactPage, ApiError> {
        let mut url = self.endpoint("contacts")?;
        url.query_pairs_mut().append_pair("emailAddress", email);

        self.fetch_contacts(url).await
    }

    /// Search contacts with a free-text parameter, one page at a time.
    ///
    /// Issues `GET {base}/contacts/search?<param>=<value>&offsetRows=<offset>&displayLength=<limit>`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`DirectoryClient::lookup_by_email`].
    pub async fn search_contacts(
        &self,
        param: SearchParam,
        value: &str,
        offset: u32,
        limit: u32,
    ) -> Result<ContactPage, ApiError> {
        let mut url = self.endpoint("contacts/search")?;
        url.query_pairs_mut()
            .append_pair(param.as_query_key(), value)
            .append_pair("offsetRows", &offset.to_string())
            .append_pair("displayLength", &limit.to_string());

        self.fetch_contacts(url).await
    }

    async fn fetch_contacts(&self, url: Url) -> Result<ContactPage, ApiError> {
        debug!(url = %url, "Querying directory contacts");

        let response = self
            .authorized(self.http_client.get(url.clone()))
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();

        // The directory reports "no records" as 404 on both endpoints.
        if status == StatusCode::NOT_FOUND {
            return Ok(ContactPage {
                url: url.to_string(),
                contacts: Vec::new(),
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(ApiError::HttpError {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await.map_err(ApiError::from_transport)?;
        let contacts = parse_contacts(&text)?;

        debug!(url = %url, count = contacts.len(), "Directory returned contacts");

        Ok(ContactPage {
            url: url.to_string(),
            contacts,
        })
    }
}

/// Parse a directory response body into contact records.
///
/// Arrays yield one contact per object element, a bare object is a single
/// record, and an empty body or `null` is an empty page.
pub(crate) fn parse_contacts(text: &str) -> Result<Vec<Contact>, ApiError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(text)?;

    let contacts = match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(Contact::from_fields(fields)),
                _ => None,
            })
            .collect(),
        Value::Object(fields) => vec![Contact::from_fields(fields)],
        _ => Vec::new(),
    };

    Ok(contacts)
}

#[cfg(test)]
#[path = "contact_tests.rs"]
mod tests;
