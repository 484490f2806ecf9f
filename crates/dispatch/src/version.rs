//! API version extraction.
//!
//! A [`VersionResolver`] is configured with one [`VersioningStrategy`] and turns a request
//! into `(version, path)`. Only the URI strategy rewrites the path; the other strategies
//! read a header (or defer to a custom extractor) and leave the path untouched.

use crate::path::normalize_path;
use crate::request::Request;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// A route's version key: a literal version string or the neutral sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// Matches any request version when no version specific route exists.
    Neutral,
    Token(String),
}

impl Version {
    pub fn token(version: impl Into<String>) -> Self {
        Version::Token(version.into())
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, Version::Neutral)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Neutral => f.write_str("VERSION_NEUTRAL"),
            Version::Token(token) => f.write_str(token),
        }
    }
}

impl From<&str> for Version {
    fn from(value: &str) -> Self {
        Version::token(value)
    }
}

impl From<String> for Version {
    fn from(value: String) -> Self {
        Version::Token(value)
    }
}

type ExtractorFn = dyn Fn(&Request) -> Option<String> + Send + Sync;

/// A user supplied function computing the version from the whole request.
#[derive(Clone)]
pub struct CustomExtractor(Arc<ExtractorFn>);

impl CustomExtractor {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Request) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn extract(&self, request: &Request) -> Option<String> {
        (self.0)(request)
    }
}

impl fmt::Debug for CustomExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomExtractor")
    }
}

fn default_uri_prefix() -> Option<String> {
    Some("v".to_string())
}

/// How the version is carried by a request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersioningStrategy {
    /// `/v1/users`: the first segment (after the global prefix) made of `prefix` followed by
    /// a token starting with an ASCII digit.
    Uri {
        #[serde(default = "default_uri_prefix")]
        prefix: Option<String>,
    },
    /// The value of the named header.
    Header { header: String },
    /// `accept: application/json;v=2` with `key = "v"` (or `"v="`).
    MediaType {
        key: String,
        #[serde(default = "default_media_type_header")]
        header: String,
    },
    #[serde(skip)]
    Custom(CustomExtractor),
}

fn default_media_type_header() -> String {
    http::header::ACCEPT.as_str().to_string()
}

impl VersioningStrategy {
    pub fn uri() -> Self {
        VersioningStrategy::Uri { prefix: default_uri_prefix() }
    }

    pub fn uri_with_prefix(prefix: impl Into<String>) -> Self {
        VersioningStrategy::Uri { prefix: Some(prefix.into()) }
    }

    pub fn header(header: impl Into<String>) -> Self {
        VersioningStrategy::Header { header: header.into() }
    }

    pub fn media_type(key: impl Into<String>) -> Self {
        VersioningStrategy::MediaType { key: key.into(), header: default_media_type_header() }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Request) -> Option<String> + Send + Sync + 'static,
    {
        VersioningStrategy::Custom(CustomExtractor::new(f))
    }
}

/// The outcome of version resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: Option<String>,
    pub path: String,
}

/// Extracts the version token of a request under the configured strategy.
#[derive(Debug, Clone, Default)]
pub struct VersionResolver {
    strategy: Option<VersioningStrategy>,
    global_prefix: Option<String>,
}

impl VersionResolver {
    pub fn new(strategy: Option<VersioningStrategy>, global_prefix: Option<String>) -> Self {
        let global_prefix = global_prefix.map(|p| normalize_path(&p)).filter(|p| p != "/");
        Self { strategy, global_prefix }
    }

    pub fn is_enabled(&self) -> bool {
        self.strategy.is_some()
    }

    /// Resolves the version of a full request.
    pub fn resolve_request(&self, request: &Request) -> ResolvedVersion {
        match &self.strategy {
            Some(VersioningStrategy::Custom(extractor)) => {
                ResolvedVersion { version: extractor.extract(request), path: normalize_path(request.path()) }
            }
            _ => self.resolve(request.path(), |name| request.header(name)),
        }
    }

    /// Resolves from a path and a header lookup. The custom strategy needs the whole request
    /// and yields no version here.
    pub fn resolve<'h, H>(&self, path: &str, header: H) -> ResolvedVersion
    where
        H: Fn(&str) -> Option<&'h str>,
    {
        let path = normalize_path(path);
        match &self.strategy {
            None | Some(VersioningStrategy::Custom(_)) => ResolvedVersion { version: None, path },
            Some(VersioningStrategy::Uri { prefix }) => self.resolve_uri(path, prefix.as_deref()),
            Some(VersioningStrategy::Header { header: name }) => ResolvedVersion {
                version: header(name).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string),
                path,
            },
            Some(VersioningStrategy::MediaType { key, header: name }) => {
                ResolvedVersion { version: header(name).and_then(|value| media_type_version(value, key)), path }
            }
        }
    }

    fn resolve_uri(&self, path: String, prefix: Option<&str>) -> ResolvedVersion {
        let (head, rest) = match &self.global_prefix {
            Some(global) if path == *global => return ResolvedVersion { version: None, path },
            Some(global) if path.starts_with(global.as_str()) && path[global.len()..].starts_with('/') => {
                (global.as_str(), &path[global.len()..])
            }
            _ => ("", path.as_str()),
        };

        let mut segments = rest.splitn(3, '/').skip(1);
        let Some(first) = segments.next() else {
            return ResolvedVersion { version: None, path };
        };

        let version = prefix
            .filter(|p| !p.is_empty())
            .map_or(Some(first), |prefix| first.strip_prefix(prefix))
            .filter(|v| v.starts_with(|c: char| c.is_ascii_digit()));

        match version {
            Some(version) => {
                let remainder = segments.next().unwrap_or_default();
                let stripped = normalize_path(&format!("{head}/{remainder}"));
                ResolvedVersion { version: Some(version.to_string()), path: stripped }
            }
            None => ResolvedVersion { version: None, path },
        }
    }
}

fn media_type_version(value: &str, key: &str) -> Option<String> {
    let key = key.trim().trim_end_matches('=');
    value
        .split([';', ','])
        .map(str::trim)
        .filter_map(|part| part.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}
