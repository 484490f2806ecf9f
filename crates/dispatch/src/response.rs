//! The mutable response model.
//!
//! Handlers and interceptors mutate the [`ResponseModel`] stored in the execution context
//! (status, headers, content type); the dispatcher serializes it into an
//! `http::Response<ResponseBody>` once the pipelines have finished.

use crate::body::ResponseBody;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use mime::Mime;
use serde_json::Value;
use tracing::warn;

/// A single, fully materialized response payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Content {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

impl Content {
    /// The media type implied by the content when none was set explicitly.
    pub fn default_mime(&self) -> Mime {
        match self {
            Content::Empty | Content::Text(_) => mime::TEXT_PLAIN_UTF_8,
            Content::Json(_) => mime::APPLICATION_JSON,
            Content::Bytes(_) => mime::APPLICATION_OCTET_STREAM,
        }
    }

    /// The exact bytes written to the wire.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Content::Empty => Bytes::new(),
            Content::Json(value) => match serde_json::to_vec(value) {
                Ok(vec) => Bytes::from(vec),
                Err(e) => {
                    warn!(cause = %e, "failed to serialize json content");
                    Bytes::new()
                }
            },
            Content::Text(text) => Bytes::from(text.clone()),
            Content::Bytes(bytes) => bytes.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Empty => true,
            Content::Json(_) => false,
            Content::Text(text) => text.is_empty(),
            Content::Bytes(bytes) => bytes.is_empty(),
        }
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        Content::Json(value)
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<&'static str> for Content {
    fn from(value: &'static str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<Bytes> for Content {
    fn from(value: Bytes) -> Self {
        Content::Bytes(value)
    }
}

/// `{content, statusCode, headers, contentType}`, mutated in place before serialization.
#[derive(Debug, Clone, Default)]
pub struct ResponseModel {
    content: Content,
    status: StatusCode,
    headers: HeaderMap,
    content_type: Option<Mime>,
}

impl ResponseModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn update_content(&mut self, content: impl Into<Content>) {
        self.content = content.into();
    }

    pub fn take_content(&mut self) -> Content {
        std::mem::take(&mut self.content)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// The explicit content type, or the one implied by the content.
    pub fn content_type(&self) -> Mime {
        self.content_type.clone().unwrap_or_else(|| self.content.default_mime())
    }

    pub fn set_content_type(&mut self, content_type: Mime) {
        self.content_type = Some(content_type);
    }

    /// Serializes the model into a response carrying the buffered content.
    pub fn into_response(self) -> Response<ResponseBody> {
        let body = ResponseBody::once(self.content.to_bytes());
        self.into_response_with_body(body)
    }

    /// Serializes status and headers around a body produced elsewhere, e.g. an event stream.
    pub fn into_response_with_body(self, body: ResponseBody) -> Response<ResponseBody> {
        let content_type = self.content_type();
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        match HeaderValue::from_str(content_type.as_ref()) {
            Ok(value) => {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            Err(e) => warn!(cause = %e, content_type = %content_type, "invalid content type"),
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_content_serializes_with_sorted_keys() {
        let content = Content::Json(json!({"b": 1, "a": {"d": 2, "c": 3}}));
        assert_eq!(content.to_bytes(), Bytes::from(r#"{"a":{"c":3,"d":2},"b":1}"#));
    }

    #[test]
    fn content_type_defaults_follow_content() {
        let mut model = ResponseModel::new();
        assert_eq!(model.status(), StatusCode::OK);

        model.update_content(json!({"id": "7"}));
        assert_eq!(model.content_type(), mime::APPLICATION_JSON);

        model.update_content("hello");
        assert_eq!(model.content_type(), mime::TEXT_PLAIN_UTF_8);

        model.set_content_type(mime::TEXT_HTML);
        assert_eq!(model.content_type(), mime::TEXT_HTML);
    }

    #[test]
    fn into_response_copies_status_and_headers() {
        let mut model = ResponseModel::new();
        model.set_status(StatusCode::CREATED);
        model.set_header(HeaderName::from_static("x-trace"), HeaderValue::from_static("abc"));
        model.update_content(json!([1, 2]));

        let response = model.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-trace"], "abc");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }
}
