//! Entity tags for conditional requests.
//!
//! The tag is derived from the serialized response content, so two responses with equal
//! content always carry the same tag. `If-None-Match` on a GET turns a matching response
//! into a `304 Not Modified`; `If-Match` on PUT, PATCH or DELETE rejects a stale
//! representation with `412 Precondition Failed`.

use crate::error::DispatchError;
use crate::request::Request;
use crate::response::{Content, ResponseModel};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::header::{ETAG, IF_MATCH, IF_NONE_MATCH};
use http::{HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const DIGEST_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EtagConfig {
    pub enabled: bool,
    /// Emit `W/"..."` instead of `"..."`.
    pub weak: bool,
    pub prefix: String,
}

impl Default for EtagConfig {
    fn default() -> Self {
        Self { enabled: true, weak: true, prefix: "c-".to_string() }
    }
}

/// The conditional headers of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    method: Method,
    if_none_match: Option<String>,
    if_match: Option<String>,
}

impl Conditions {
    pub fn new(method: Method, if_none_match: Option<String>, if_match: Option<String>) -> Self {
        Self { method, if_none_match, if_match }
    }

    pub fn from_request(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            if_none_match: request.header(IF_NONE_MATCH.as_str()).map(str::to_string),
            if_match: request.header(IF_MATCH.as_str()).map(str::to_string),
        }
    }

    pub fn if_match(&self) -> Option<&str> {
        self.if_match.as_deref()
    }

    /// True for the methods whose `If-Match` is validated.
    pub fn is_unsafe(&self) -> bool {
        matches!(self.method, Method::PUT | Method::PATCH | Method::DELETE)
    }

    /// Drops `If-Match` once it has been validated.
    pub fn without_if_match(mut self) -> Self {
        self.if_match = None;
        self
    }
}

/// Removes surrounding quotes and the weak prefix.
pub fn strip_etag_quotes(etag: &str) -> &str {
    let etag = etag.trim();
    let etag = etag.strip_prefix("W/").unwrap_or(etag);
    etag.trim_matches('"')
}

/// Matches a conditional header value (`*`, one tag or a comma separated list) against a tag.
fn header_matches(header: &str, tag: &str) -> bool {
    let tag = strip_etag_quotes(tag);
    header.split(',').map(str::trim).any(|candidate| candidate == "*" || strip_etag_quotes(candidate) == tag)
}

#[derive(Debug, Clone, Default)]
pub struct ConditionalResponseCache {
    config: EtagConfig,
}

impl ConditionalResponseCache {
    pub fn new(config: EtagConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EtagConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Digest of the serialized content: truncated SHA-256, base64 encoded, with the
    /// configured prefix. Deterministic for equal content.
    pub fn compute_tag(&self, content: &Content) -> String {
        let digest = Sha256::digest(canonical_bytes(content));
        format!("{}{}", self.config.prefix, URL_SAFE_NO_PAD.encode(&digest[..DIGEST_LEN]))
    }

    /// The header form of a tag.
    pub fn format_tag(&self, tag: &str) -> String {
        if self.config.weak { format!("W/\"{tag}\"") } else { format!("\"{tag}\"") }
    }

    /// True when `if_match` accepts the current representation.
    pub fn check_if_match(&self, if_match: &str, content: &Content) -> bool {
        header_matches(if_match, &self.compute_tag(content))
    }

    /// Sets the `ETag` header from the final content and applies the conditional headers.
    ///
    /// A matching `If-None-Match` on GET empties the response into a 304. A non matching
    /// `If-Match` on an unsafe method fails with [`DispatchError::PreconditionFailed`]
    /// without touching the response.
    pub fn apply(&self, conditions: &Conditions, response: &mut ResponseModel) -> Result<(), DispatchError> {
        if !self.config.enabled {
            return Ok(());
        }

        let tag = self.compute_tag(response.content());

        if conditions.is_unsafe()
            && let Some(if_match) = &conditions.if_match
            && !header_matches(if_match, &tag)
        {
            debug!(if_match = %if_match, etag = %tag, "precondition failed");
            return Err(DispatchError::PreconditionFailed);
        }

        match HeaderValue::from_str(&self.format_tag(&tag)) {
            Ok(value) => {
                response.set_header(ETAG, value);
            }
            Err(e) => warn!(cause = %e, etag = %tag, "invalid etag header value"),
        }

        if conditions.method == Method::GET
            && let Some(if_none_match) = &conditions.if_none_match
            && header_matches(if_none_match, &tag)
        {
            response.set_status(StatusCode::NOT_MODIFIED);
            response.update_content(Content::Empty);
            response.set_content_type(mime::TEXT_PLAIN);
        }

        Ok(())
    }
}

/// The bytes hashed for a tag: JSON objects are written with their keys sorted whatever
/// order the map keeps them in.
fn canonical_bytes(content: &Content) -> Vec<u8> {
    match content {
        Content::Json(value) => serde_json::to_vec(&Canonical(value)).unwrap_or_else(|e| {
            warn!(cause = %e, "failed to serialize json content for etag");
            Vec::new()
        }),
        other => other.to_bytes().to_vec(),
    }
}

struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => map.iter().map(|(k, v)| (k, Canonical(v))).collect::<BTreeMap<_, _>>().serialize(serializer),
            Value::Array(items) => serializer.collect_seq(items.iter().map(Canonical)),
            other => other.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> ConditionalResponseCache {
        ConditionalResponseCache::default()
    }

    fn model(content: serde_json::Value) -> ResponseModel {
        let mut model = ResponseModel::new();
        model.update_content(content);
        model
    }

    #[test]
    fn tag_is_deterministic_and_key_order_independent() {
        let a = cache().compute_tag(&Content::Json(json!({"a": 1, "b": [1, 2]})));
        let b = cache().compute_tag(&Content::Json(json!({"b": [1, 2], "a": 1})));
        assert_eq!(a, b);
        assert!(a.starts_with("c-"));
        assert_eq!(a.len(), 2 + 22);

        assert_ne!(a, cache().compute_tag(&Content::Json(json!({"a": 2}))));
    }

    #[test]
    fn strip_quotes() {
        assert_eq!(strip_etag_quotes("W/\"c-abc\""), "c-abc");
        assert_eq!(strip_etag_quotes(" \"c-abc\" "), "c-abc");
        assert_eq!(strip_etag_quotes("c-abc"), "c-abc");
    }

    #[test]
    fn sets_weak_etag_header() {
        let mut response = model(json!({"id": 1}));
        cache().apply(&Conditions::new(Method::GET, None, None), &mut response).unwrap();

        let header = response.headers()[ETAG].to_str().unwrap().to_string();
        assert!(header.starts_with("W/\"c-"));
        assert_eq!(response.status(), StatusCode::OK);

        let strong = ConditionalResponseCache::new(EtagConfig { weak: false, ..EtagConfig::default() });
        let mut response = model(json!({"id": 1}));
        strong.apply(&Conditions::new(Method::GET, None, None), &mut response).unwrap();
        assert!(response.headers()[ETAG].to_str().unwrap().starts_with("\"c-"));
    }

    #[test]
    fn matching_if_none_match_is_not_modified() {
        let tag = cache().compute_tag(&Content::Json(json!({"id": 1})));
        let mut response = model(json!({"id": 1}));

        let conditions = Conditions::new(Method::GET, Some(format!("\"other\", W/\"{tag}\"")), None);
        cache().apply(&conditions, &mut response).unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(response.content().is_empty());
        assert_eq!(response.content_type(), mime::TEXT_PLAIN);
    }

    #[test]
    fn if_none_match_ignored_for_unsafe_methods() {
        let mut response = model(json!({"id": 1}));
        cache().apply(&Conditions::new(Method::PUT, Some("*".into()), None), &mut response).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn stale_if_match_is_precondition_failed() {
        let mut response = model(json!({"id": 1}));
        let error = cache()
            .apply(&Conditions::new(Method::PUT, None, Some("W/\"c-stale\"".into())), &mut response)
            .unwrap_err();

        assert!(matches!(error, DispatchError::PreconditionFailed));
        assert!(response.headers().get(ETAG).is_none());

        let mut response = model(json!({"id": 1}));
        cache().apply(&Conditions::new(Method::DELETE, None, Some("*".into())), &mut response).unwrap();
        assert!(cache().check_if_match("*", &Content::Empty));
    }

    #[test]
    fn disabled_cache_does_nothing() {
        let cache = ConditionalResponseCache::new(EtagConfig { enabled: false, ..EtagConfig::default() });
        let mut response = model(json!({"id": 1}));
        cache.apply(&Conditions::new(Method::PUT, None, Some("nope".into())), &mut response).unwrap();
        assert!(response.headers().get(ETAG).is_none());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: EtagConfig = serde_json::from_str(r#"{"weak": false}"#).unwrap();
        assert_eq!(config, EtagConfig { enabled: true, weak: false, prefix: "c-".into() });
    }

    #[test]
    fn json_is_hashed_with_sorted_keys() {
        let value = json!({"b": [{"z": 1, "a": null}], "a": {"d": "x", "c": 2.5}});
        assert_eq!(
            String::from_utf8(canonical_bytes(&Content::Json(value.clone()))).unwrap(),
            r#"{"a":{"c":2.5,"d":"x"},"b":[{"a":null,"z":1}]}"#
        );

        let canonical = Content::Text(r#"{"a":{"c":2.5,"d":"x"},"b":[{"a":null,"z":1}]}"#.to_string());
        assert_eq!(cache().compute_tag(&Content::Json(value)), cache().compute_tag(&canonical));
    }
}
