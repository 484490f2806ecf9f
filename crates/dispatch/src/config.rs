//! Loadable dispatcher configuration.
//!
//! ```json
//! {
//!   "global_prefix": "/api",
//!   "versioning": { "type": "URI", "prefix": "v" },
//!   "default_version": ["1", "2"],
//!   "etag": { "weak": true },
//!   "powered_by": "micro-dispatch"
//! }
//! ```

use crate::etag::EtagConfig;
use crate::version::VersioningStrategy;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub global_prefix: Option<String>,
    pub versioning: Option<VersioningStrategy>,
    /// A single version or a list of versions.
    #[serde(deserialize_with = "one_or_many")]
    pub default_version: Vec<String>,
    pub etag: EtagConfig,
    /// Value of the `X-Powered-By` header, omitted when unset.
    pub powered_by: Option<String>,
}

impl DispatchConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(v)) => vec![v],
        Some(OneOrMany::Many(v)) => v,
        None => vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = DispatchConfig::from_json_str("{}").unwrap();
        assert!(config.global_prefix.is_none());
        assert!(config.versioning.is_none());
        assert!(config.default_version.is_empty());
        assert_eq!(config.etag, EtagConfig::default());
        assert!(config.powered_by.is_none());
    }

    #[test]
    fn full_config() {
        let config = DispatchConfig::from_json_str(
            r#"{
                "global_prefix": "/api",
                "versioning": {"type": "URI"},
                "default_version": "1",
                "etag": {"enabled": false},
                "powered_by": "micro-dispatch"
            }"#,
        )
        .unwrap();

        assert_eq!(config.global_prefix.as_deref(), Some("/api"));
        assert!(matches!(config.versioning, Some(VersioningStrategy::Uri { .. })));
        assert_eq!(config.default_version, ["1"]);
        assert!(!config.etag.enabled);
        assert_eq!(config.etag.prefix, "c-");

        let config = DispatchConfig::from_json_str(r#"{"default_version": ["1", "2"]}"#).unwrap();
        assert_eq!(config.default_version, ["1", "2"]);
    }

    #[test]
    fn invalid_strategy_is_rejected() {
        assert!(DispatchConfig::from_json_str(r#"{"versioning": {"type": "CUSTOM"}}"#).is_err());
    }
}
