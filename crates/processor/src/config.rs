//! Processor configuration: parsing and validating the host's parameter map.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use llm_embed_record::{FieldPath, FieldValue};
use serde_json::Value;

use crate::batch::ErrorPolicy;
use crate::client::DEFAULT_ENDPOINT;
use crate::error::{ComputeError, ConfigError};
use crate::spec::specification;

pub const PARAM_SOURCE: &str = "source";
pub const PARAM_TARGET: &str = "target";
pub const PARAM_URL: &str = "url";
pub const PARAM_ENCODING: &str = "encoding";
pub const PARAM_ERROR_POLICY: &str = "error_policy";
pub const PARAM_CHECK_STATUS: &str = "check_status";

/// How the embedding service's response is stored in the target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueEncoding {
    /// Store the response bytes untouched. Inside structured data they are
    /// kept as a base64 string, which decodes back to the exact response.
    #[default]
    Raw,
    /// Parse the response as JSON and store the parsed value.
    Json,
}

impl ValueEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueEncoding::Raw => "raw",
            ValueEncoding::Json => "json",
        }
    }

    pub fn encode(&self, body: Vec<u8>) -> Result<FieldValue, ComputeError> {
        match self {
            ValueEncoding::Raw => Ok(FieldValue::Bytes(body)),
            ValueEncoding::Json => serde_json::from_slice(&body)
                .map(FieldValue::Json)
                .map_err(ComputeError::InvalidResponse),
        }
    }
}

impl fmt::Display for ValueEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(ValueEncoding::Raw),
            "json" => Ok(ValueEncoding::Json),
            other => Err(format!("unknown encoding '{other}'")),
        }
    }
}

/// Validated processor configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedConfig {
    pub source: FieldPath,
    pub target: FieldPath,
    pub url: String,
    pub encoding: ValueEncoding,
    pub error_policy: ErrorPolicy,
    pub check_status: bool,
}

impl EmbedConfig {
    /// A configuration with every optional parameter at its default.
    pub fn new(source: &str, target: &str) -> Result<Self, ConfigError> {
        Ok(EmbedConfig {
            source: parse_reference(PARAM_SOURCE, source)?,
            target: parse_reference(PARAM_TARGET, target)?,
            url: DEFAULT_ENDPOINT.to_string(),
            encoding: ValueEncoding::default(),
            error_policy: ErrorPolicy::default(),
            check_status: false,
        })
    }

    /// Validate the host's parameters against the specification's schema and
    /// build the typed configuration.
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let schema = specification().config_schema();
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| ConfigError::Schema(e.to_string()))?;

        let instance = Value::Object(
            params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        );
        let errors: Vec<String> = validator
            .iter_errors(&instance)
            .map(|e| format!("{}", e))
            .collect();
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        let param = |name: &str| params.get(name).map(String::as_str);

        let mut config = EmbedConfig::new(
            param(PARAM_SOURCE).unwrap_or_default(),
            param(PARAM_TARGET).unwrap_or_default(),
        )?;
        if let Some(url) = param(PARAM_URL) {
            config.url = parse_endpoint(url)?;
        }
        if let Some(encoding) = param(PARAM_ENCODING) {
            config.encoding = encoding
                .parse()
                .map_err(|e: String| ConfigError::Invalid(vec![e]))?;
        }
        if let Some(policy) = param(PARAM_ERROR_POLICY) {
            config.error_policy = policy
                .parse()
                .map_err(|e: String| ConfigError::Invalid(vec![e]))?;
        }
        config.check_status = param(PARAM_CHECK_STATUS) == Some("true");

        Ok(config)
    }
}

/// The embedding endpoint must be an absolute http(s) URL.
fn parse_endpoint(url: &str) -> Result<String, ConfigError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| ConfigError::Invalid(vec![format!("url '{url}' is not valid: {e}")]))?;
    match parsed.scheme() {
        "http" | "https" => Ok(url.to_string()),
        scheme => Err(ConfigError::Invalid(vec![format!(
            "url '{url}' has unsupported scheme '{scheme}'"
        )])),
    }
}

fn parse_reference(param: &'static str, expr: &str) -> Result<FieldPath, ConfigError> {
    FieldPath::parse(expr).map_err(|source| ConfigError::Reference { param, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_embed_record::Root;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn minimal_params_use_defaults() {
        let config =
            EmbedConfig::from_params(&params(&[("source", "text"), ("target", "embedding")]))
                .unwrap();
        assert_eq!(config.source.root(), Root::After);
        assert_eq!(config.source.fields(), ["text"]);
        assert_eq!(config.target.fields(), ["embedding"]);
        assert_eq!(config.url, DEFAULT_ENDPOINT);
        assert_eq!(config.encoding, ValueEncoding::Raw);
        assert_eq!(config.error_policy, ErrorPolicy::FailFast);
        assert!(!config.check_status);
    }

    #[test]
    fn optional_params_are_applied() {
        let config = EmbedConfig::from_params(&params(&[
            ("source", ".Payload.After"),
            ("target", ".Payload.After.vector"),
            ("url", "http://embedder:9000/v1/embed"),
            ("encoding", "json"),
            ("error_policy", "isolate"),
            ("check_status", "true"),
        ]))
        .unwrap();
        assert!(config.source.fields().is_empty());
        assert_eq!(config.url, "http://embedder:9000/v1/embed");
        assert_eq!(config.encoding, ValueEncoding::Json);
        assert_eq!(config.error_policy, ErrorPolicy::Isolate);
        assert!(config.check_status);
    }

    #[test]
    fn missing_target_is_rejected() {
        let err = EmbedConfig::from_params(&params(&[("source", "text")])).unwrap_err();
        let ConfigError::Invalid(errors) = err else {
            panic!("expected Invalid, got {err:?}");
        };
        assert!(errors.iter().any(|e| e.contains("target")), "{errors:?}");
    }

    #[test]
    fn blank_source_is_rejected() {
        let err = EmbedConfig::from_params(&params(&[("source", "  "), ("target", "x")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {err:?}");
    }

    #[test]
    fn unknown_param_is_rejected() {
        let err = EmbedConfig::from_params(&params(&[
            ("source", "text"),
            ("target", "embedding"),
            ("retries", "3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn out_of_range_choices_are_rejected() {
        for (name, value) in [
            ("encoding", "base64"),
            ("error_policy", "skip"),
            ("check_status", "yes"),
        ] {
            let result = EmbedConfig::from_params(&params(&[
                ("source", "text"),
                ("target", "embedding"),
                (name, value),
            ]));
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn malformed_url_is_rejected() {
        for url in ["not a url", "/embedding", "ftp://embedder/embedding"] {
            let err = EmbedConfig::from_params(&params(&[
                ("source", "text"),
                ("target", "embedding"),
                ("url", url),
            ]))
            .unwrap_err();
            let ConfigError::Invalid(errors) = err else {
                panic!("expected Invalid for {url}, got {err:?}");
            };
            assert!(errors[0].contains(url), "{errors:?}");
        }
    }

    #[test]
    fn malformed_reference_is_rejected() {
        let err = EmbedConfig::from_params(&params(&[
            ("source", ".Payload.Sideways.text"),
            ("target", "embedding"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Reference {
                param: "source",
                ..
            }
        ));
    }

    #[test]
    fn raw_encoding_keeps_bytes() {
        let value = ValueEncoding::Raw.encode(b"not json".to_vec()).unwrap();
        assert_eq!(value, FieldValue::Bytes(b"not json".to_vec()));
    }

    #[test]
    fn json_encoding_parses_body() {
        let value = ValueEncoding::Json.encode(b"[0.5, 1.5]".to_vec()).unwrap();
        assert_eq!(value, FieldValue::Json(json!([0.5, 1.5])));

        let err = ValueEncoding::Json.encode(b"not json".to_vec()).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidResponse(_)));
    }
}
