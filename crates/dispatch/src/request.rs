//! The request model the dispatcher works on.
//!
//! This module contains the core request types of the engine:
//! - `Request`: method, path, headers, query map and body value, as produced by a transport adapter
//! - `PathParams`: parameters captured from the path during routing

use http::request::Parts;
use http::{HeaderMap, Method};
use serde_json::Value;
use std::collections::HashMap;

/// A parsed request.
///
/// Everything below the abstraction of "headers map", "query map" and "body value" is the
/// transport's job; [`Request::from_parts`] covers the common case of an `http` request
/// whose body has already been decoded.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: HashMap<String, String>,
    body: Value,
    path_params: PathParams,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: HashMap::new(),
            body: Value::Null,
            path_params: PathParams::empty(),
        }
    }

    /// Builds a request from `http` parts and an already decoded body.
    ///
    /// The query string is parsed as `application/x-www-form-urlencoded`; for repeated keys
    /// the last value wins. A malformed query string yields an empty query map.
    pub fn from_parts(parts: Parts, body: Value) -> Self {
        let query = parts.uri.query().map(parse_query).unwrap_or_default();
        Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            headers: parts.headers,
            query,
            body,
            path_params: PathParams::empty(),
        }
    }

    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns a header as a string, ignoring values that are not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.query
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    /// Returns a reference to the path parameters captured while routing
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub(crate) fn set_path_params(&mut self, params: PathParams) {
        self.path_params = params;
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

/// Represents path parameters extracted from the URL path of a request.
///
/// Path parameters are named segments in the route pattern. For example, in the pattern
/// "/users/:id", "id" is a path parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    inner: HashMap<String, String>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if there are no path parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of path parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.inner.get(key.as_ref()).map(String::as_str)
    }

    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.inner.contains_key(key.as_ref())
    }

    pub(crate) fn insert(&mut self, key: String, value: String) {
        self.inner.insert(key, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { inner: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_parts_parses_query() {
        let (parts, ()) = http::Request::builder()
            .method(Method::GET)
            .uri("/items/7?color=red&size=xl&color=blue")
            .header("x-api-version", "2")
            .body(())
            .unwrap()
            .into_parts();

        let request = Request::from_parts(parts, json!({"a": 1}));

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.path(), "/items/7");
        assert_eq!(request.query().get("color").map(String::as_str), Some("blue"));
        assert_eq!(request.query().get("size").map(String::as_str), Some("xl"));
        assert_eq!(request.header("X-API-Version"), Some("2"));
        assert_eq!(request.body()["a"], 1);
        assert!(request.path_params().is_empty());
    }

    #[test]
    fn path_params_lookup() {
        let params: PathParams = [("id", "42")].into_iter().collect();
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("id"), Some("42"));
        assert!(params.get("missing").is_none());
        assert!(PathParams::empty().is_empty());
    }
}
