//! Route pattern compilation and path normalization.
//!
//! A pattern such as `/users/:id/posts/:post_id` is compiled once at startup into an
//! anchored regular expression. Parameter markers capture any run of characters that
//! does not contain `/`, a trailing slash on the concrete path is tolerated, and the
//! pattern's specificity is the number of literal segments it contains.

use crate::error::RouterBuildError;
use crate::request::PathParams;
use once_cell::sync::Lazy;
use regex::Regex;

const PARAM_MARKER: char = ':';

static PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":(\w+)").expect("static regex is valid"));

/// Collapses repeated separators and strips the trailing separator, except for the root.
///
/// An empty path normalizes to `/` and a missing leading separator is added, so the
/// function is idempotent for every input.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if normalized.len() > 1 {
            normalized.push('/');
        }
        normalized.push_str(segment);
    }

    normalized
}

/// Returns true when the pattern has at least one parameter segment.
pub fn is_dynamic(pattern: &str) -> bool {
    pattern.contains(PARAM_MARKER)
}

/// Count of literal (non parameter) segments.
pub fn specificity(pattern: &str) -> usize {
    pattern.split('/').filter(|s| !s.is_empty() && !s.starts_with(PARAM_MARKER)).count()
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
    param_names: Vec<String>,
    specificity: usize,
}

impl PathPattern {
    /// Compiles a pattern. The pattern is normalized first.
    pub fn compile(pattern: &str) -> Result<Self, RouterBuildError> {
        let raw = normalize_path(pattern);

        let mut expr = String::with_capacity(raw.len() * 2);
        let mut param_names = Vec::new();
        let mut last = 0;

        expr.push('^');
        for captures in PARAM_RE.captures_iter(&raw) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };

            if param_names.iter().any(|n| n == name.as_str()) {
                return Err(RouterBuildError::invalid_pattern(&raw, format!("duplicated parameter '{}'", name.as_str())));
            }

            expr.push_str(&regex::escape(&raw[last..whole.start()]));
            expr.push_str(&format!("(?P<{}>[^/]+)", name.as_str()));
            param_names.push(name.as_str().to_string());
            last = whole.end();
        }
        expr.push_str(&regex::escape(&raw[last..]));
        expr.push_str("/?$");

        let regex = Regex::new(&expr).map_err(|e| RouterBuildError::invalid_pattern(&raw, e))?;
        let specificity = specificity(&raw);

        Ok(Self { raw, regex, param_names, specificity })
    }

    /// The normalized pattern text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn specificity(&self) -> usize {
        self.specificity
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Matches an already normalized path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let captures = self.regex.captures(path)?;

        let mut params = PathParams::empty();
        for name in &self.param_names {
            if let Some(value) = captures.name(name) {
                params.insert(name.clone(), value.as_str().to_string());
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_trims() {
        assert_eq!(normalize_path("/users//"), "/users");
        assert_eq!(normalize_path("//users///:id/"), "/users/:id");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("users"), "/users");
    }

    #[test]
    fn normalize_is_idempotent() {
        for path in ["", "/", "//", "/a//b/", "a/b", "/users/:id/", "///x///y///", "/v1/items/7"] {
            let once = normalize_path(path);
            assert_eq!(normalize_path(&once), once, "path: {path:?}");
        }
    }

    #[test]
    fn specificity_counts_literal_segments() {
        assert_eq!(specificity("/users/:id"), 1);
        assert_eq!(specificity("/users/me"), 2);
        assert_eq!(specificity("/:a/:b"), 0);
        assert_eq!(specificity("/"), 0);
    }

    #[test]
    fn dynamic_pattern_captures_params() {
        let pattern = PathPattern::compile("/users/:id/posts/:post_id").unwrap();
        assert_eq!(pattern.specificity(), 2);
        assert_eq!(pattern.param_names(), ["id", "post_id"]);

        let params = pattern.matches("/users/42/posts/abc").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("post_id"), Some("abc"));
    }

    #[test]
    fn params_do_not_cross_separators() {
        let pattern = PathPattern::compile("/users/:id").unwrap();
        assert!(pattern.matches("/users/42/extra").is_none());
        assert!(pattern.matches("/users/").is_none());
        assert!(pattern.matches("/users/42/").is_some());
    }

    #[test]
    fn literal_text_is_escaped() {
        let pattern = PathPattern::compile("/files/:name.json").unwrap();
        assert_eq!(pattern.matches("/files/report.json").unwrap().get("name"), Some("report"));
        assert!(pattern.matches("/files/reportxjson").is_none());
    }

    #[test]
    fn duplicated_params_are_rejected() {
        assert!(PathPattern::compile("/a/:id/b/:id").is_err());
    }
}
