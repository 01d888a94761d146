//! # Webhook Signature Verification
//!
//! The helpdesk signs deliveries with HMAC-SHA1 over the `data` portion of the
//! body and sends the base64 digest in a header. Different producers serialise
//! `data` slightly differently, so several signing inputs are tried in a fixed
//! order and the first one that matches wins.
//!
//! Comparison is always constant time. A loose substring comparison exists for
//! producers that wrap the digest in extra text; it must be enabled explicitly
//! and is logged whenever it is the deciding factor.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha1::Sha1;
use std::fmt;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::PipelineConfig;

type HmacSha1 = Hmac<Sha1>;

/// Prefix some producers put in front of the digest.
pub const SIGNATURE_PREFIX: &str = "sha1=";

// ============================================================================
// Verdict Types
// ============================================================================

/// Byte sequence a signature may have been computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureCandidate {
    /// The exact bytes of the top-level `data` value as received
    RawDataSubstring,
    /// `data` parsed and serialised again in compact form
    ReserializedData,
    /// The entire request body
    WholeBody,
}

impl SignatureCandidate {
    /// Candidates in the order they are tried.
    pub const ORDER: [SignatureCandidate; 3] =
        [Self::RawDataSubstring, Self::ReserializedData, Self::WholeBody];

    /// Stable name used in logs and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawDataSubstring => "raw_data_substring",
            Self::ReserializedData => "reserialized_data",
            Self::WholeBody => "whole_body",
        }
    }
}

impl fmt::Display for SignatureCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a delivery was accepted without checking its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassReason {
    /// No shared secret is configured
    NoSecretConfigured,
    /// The operator enabled unverified mode
    AllowUnverified,
}

impl BypassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSecretConfigured => "no_secret_configured",
            Self::AllowUnverified => "allow_unverified",
        }
    }
}

/// Outcome of signature verification for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureVerdict {
    /// Whether processing may continue
    pub accepted: bool,
    /// Candidate whose digest matched the header
    pub matched: Option<SignatureCandidate>,
    /// Set when verification was skipped
    pub bypass: Option<BypassReason>,
    /// Set when the match relied on the loose substring comparison
    pub loose: bool,
    /// Whether the delivery carried a signature header at all
    pub header_present: bool,
    /// Candidates computed, in order
    pub tried: Vec<SignatureCandidate>,
}

impl SignatureVerdict {
    fn bypassed(reason: BypassReason, header_present: bool) -> Self {
        Self {
            accepted: true,
            matched: None,
            bypass: Some(reason),
            loose: false,
            header_present,
            tried: Vec::new(),
        }
    }

    fn matched(
        candidate: SignatureCandidate,
        tried: Vec<SignatureCandidate>,
        loose: bool,
    ) -> Self {
        Self {
            accepted: true,
            matched: Some(candidate),
            bypass: None,
            loose,
            header_present: true,
            tried,
        }
    }

    fn rejected(tried: Vec<SignatureCandidate>, header_present: bool) -> Self {
        Self {
            accepted: false,
            matched: None,
            bypass: None,
            loose: false,
            header_present,
            tried,
        }
    }

    /// Short label for responses: the matched candidate, the bypass reason
    /// prefixed with `unverified:`, or `rejected`.
    pub fn label(&self) -> String {
        match (self.matched, self.bypass) {
            (Some(candidate), _) if self.loose => format!("loose:{}", candidate.as_str()),
            (Some(candidate), _) => candidate.as_str().to_string(),
            (None, Some(reason)) => format!("unverified:{}", reason.as_str()),
            (None, None) => "rejected".to_string(),
        }
    }
}

// ============================================================================
// Verifier
// ============================================================================

/// HMAC-SHA1 verifier for helpdesk deliveries.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<String>,
    allow_unverified: bool,
    loose_match: bool,
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &self.secret.as_ref().map(|_| "<REDACTED>"))
            .field("allow_unverified", &self.allow_unverified)
            .field("loose_match", &self.loose_match)
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier. A blank secret counts as no secret.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.trim().is_empty()),
            allow_unverified: false,
            loose_match: false,
        }
    }

    /// Accept every delivery without checking.
    pub fn allow_unverified(mut self, allow: bool) -> Self {
        self.allow_unverified = allow;
        self
    }

    /// Enable the substring comparison fallback.
    pub fn loose_match(mut self, enabled: bool) -> Self {
        self.loose_match = enabled;
        self
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.webhook_secret.clone())
            .allow_unverified(config.allow_unverified)
            .loose_match(config.loose_signature_match)
    }

    /// Whether a secret is configured.
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Verify a delivery.
    ///
    /// `body` is the decoded request body, `parsed` its JSON form when it
    /// parsed, and `header` the raw signature header value.
    pub fn verify(
        &self,
        body: &[u8],
        parsed: Option<&Value>,
        header: Option<&str>,
    ) -> SignatureVerdict {
        let header = header.map(str::trim).filter(|h| !h.is_empty());
        let header_present = header.is_some();

        if self.allow_unverified {
            warn!(
                header_present,
                "Signature verification disabled, accepting unverified webhook"
            );
            return SignatureVerdict::bypassed(BypassReason::AllowUnverified, header_present);
        }

        let Some(secret) = self.secret.as_deref() else {
            warn!(
                header_present,
                "No webhook secret configured, accepting unverified webhook"
            );
            return SignatureVerdict::bypassed(BypassReason::NoSecretConfigured, header_present);
        };

        let Some(header) = header else {
            warn!("Webhook signature header missing");
            return SignatureVerdict::rejected(Vec::new(), false);
        };

        let mut tried = Vec::new();
        let mut computed = Vec::new();

        for (candidate, input) in signing_inputs(body, parsed) {
            let Some(digest) = compute_signature(secret, &input) else {
                continue;
            };
            tried.push(candidate);

            if signature_matches(header, &digest) {
                debug!(candidate = %candidate, "Webhook signature verified");
                return SignatureVerdict::matched(candidate, tried, false);
            }
            computed.push((candidate, digest));
        }

        if self.loose_match {
            if let Some((candidate, _)) = computed
                .iter()
                .find(|(_, digest)| header.contains(digest.as_str()))
            {
                warn!(
                    candidate = %candidate,
                    header_length = header.len(),
                    "Webhook signature accepted by loose substring match"
                );
                return SignatureVerdict::matched(*candidate, tried, true);
            }
        }

        warn!(
            header_length = header.len(),
            tried = ?tried.iter().map(SignatureCandidate::as_str).collect::<Vec<_>>(),
            "Webhook signature mismatch"
        );
        SignatureVerdict::rejected(tried, true)
    }
}

// ============================================================================
// Signing Inputs
// ============================================================================

/// Byte sequences to try, in order. Candidates that cannot be produced for
/// this body are left out.
pub fn signing_inputs(
    body: &[u8],
    parsed: Option<&Value>,
) -> Vec<(SignatureCandidate, Vec<u8>)> {
    let mut inputs = Vec::with_capacity(3);

    if let Some(raw) = raw_data_slice(body) {
        inputs.push((SignatureCandidate::RawDataSubstring, raw.to_vec()));
    }

    if let Some(data) = parsed.and_then(|value| value.get("data")) {
        if let Ok(serialized) = serde_json::to_vec(data) {
            inputs.push((SignatureCandidate::ReserializedData, serialized));
        }
    }

    inputs.push((SignatureCandidate::WholeBody, body.to_vec()));
    inputs
}

/// Base64 HMAC-SHA1 digest of `input` under `secret`.
pub fn compute_signature(secret: &str, input: &[u8]) -> Option<String> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(input);
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Compare a header against a computed digest in the accepted forms: as
/// sent, with the `sha1=` prefix stripped, and against the prefixed digest.
pub fn signature_matches(header: &str, computed: &str) -> bool {
    if constant_time_eq(header, computed) {
        return true;
    }

    if let Some(stripped) = strip_prefix_ignore_case(header, SIGNATURE_PREFIX) {
        if constant_time_eq(stripped.trim(), computed) {
            return true;
        }
    }

    let prefixed = format!("{SIGNATURE_PREFIX}{computed}");
    constant_time_eq(header, &prefixed)
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// ============================================================================
// Raw Data Scanner
// ============================================================================

/// Locate the exact bytes of the top-level `data` value.
///
/// Walks the members of the top-level object without parsing it, skipping
/// string literals (double or single quoted, with escapes) and nested
/// containers, and returns the slice spanning the `data` object or array.
/// Returns `None` when the body is not an object, has no `data` member, or
/// `data` is not a container.
pub fn raw_data_slice(body: &[u8]) -> Option<&[u8]> {
    let mut i = skip_whitespace(body, 0);
    if *body.get(i)? != b'{' {
        return None;
    }
    i += 1;

    loop {
        i = skip_whitespace(body, i);
        match *body.get(i)? {
            b'}' => return None,
            b',' => i += 1,
            b'"' | b'\'' => {
                let key_end = skip_string(body, i)?;
                let key = &body[i + 1..key_end - 1];

                i = skip_whitespace(body, key_end);
                if *body.get(i)? != b':' {
                    return None;
                }
                i = skip_whitespace(body, i + 1);

                if key == b"data" {
                    return match *body.get(i)? {
                        b'{' | b'[' => {
                            let end = skip_container(body, i)?;
                            Some(&body[i..end])
                        }
                        _ => None,
                    };
                }

                i = skip_value(body, i)?;
            }
            _ => return None,
        }
    }
}

fn skip_whitespace(body: &[u8], mut i: usize) -> usize {
    while i < body.len() && body[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Index just past the string literal opening at `start`.
fn skip_string(body: &[u8], start: usize) -> Option<usize> {
    let quote = *body.get(start)?;
    let mut i = start + 1;
    while i < body.len() {
        match body[i] {
            b'\\' => i += 2,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Index just past the object or array opening at `start`.
fn skip_container(body: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < body.len() {
        match body[i] {
            b'"' | b'\'' => {
                i = skip_string(body, i)?;
                continue;
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index just past the value starting at `start`.
fn skip_value(body: &[u8], start: usize) -> Option<usize> {
    match *body.get(start)? {
        b'"' | b'\'' => skip_string(body, start),
        b'{' | b'[' => skip_container(body, start),
        _ => {
            let mut i = start;
            while i < body.len() && !matches!(body[i], b',' | b'}' | b']') {
                i += 1;
            }
            Some(i)
        }
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
