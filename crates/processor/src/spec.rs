//! Self-description of the processor.
//!
//! The host can query the specification at any time, before configuration
//! and independently of record flow.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::batch::ErrorPolicy;
use crate::client::DEFAULT_ENDPOINT;
use crate::config::{
    ValueEncoding, PARAM_CHECK_STATUS, PARAM_ENCODING, PARAM_ERROR_POLICY, PARAM_SOURCE,
    PARAM_TARGET, PARAM_URL,
};

pub const PROCESSOR_NAME: &str = "llmEmbedProcessor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Validation {
    Required,
    Inclusion(Vec<String>),
}

/// One configuration parameter as advertised to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub default: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub validations: Vec<Validation>,
}

/// Name, version and configuration schema of the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Specification {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub parameters: BTreeMap<String, Parameter>,
}

impl Specification {
    /// The parameters rendered as a JSON Schema for a string-to-string map.
    pub fn config_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for (name, parameter) in &self.parameters {
            let mut property = json!({
                "type": "string",
                "description": parameter.description,
            });
            if parameter.kind == ParameterType::Bool {
                property["enum"] = json!(["true", "false"]);
            }
            for validation in &parameter.validations {
                match validation {
                    Validation::Required => {
                        required.push(name.clone());
                        property["minLength"] = json!(1);
                        property["pattern"] = json!("\\S");
                    }
                    Validation::Inclusion(options) => {
                        property["enum"] = json!(options);
                    }
                }
            }
            if !parameter.default.is_empty() {
                property["default"] = json!(parameter.default);
            }
            properties.insert(name.clone(), property);
        }

        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": format!("{} configuration", self.name),
            "type": "object",
            "required": required,
            "properties": properties,
            "additionalProperties": false,
        })
    }
}

/// The processor's specification. Pure: no I/O, no dependency on state.
pub fn specification() -> Specification {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        PARAM_SOURCE.to_string(),
        Parameter {
            default: String::new(),
            description: "Reference to the field whose value is sent to the embedding service. \
                          A bare name addresses a field of .Payload.After."
                .to_string(),
            kind: ParameterType::String,
            validations: vec![Validation::Required],
        },
    );
    parameters.insert(
        PARAM_TARGET.to_string(),
        Parameter {
            default: String::new(),
            description: "Reference to the field the embedding is written to.".to_string(),
            kind: ParameterType::String,
            validations: vec![Validation::Required],
        },
    );
    parameters.insert(
        PARAM_URL.to_string(),
        Parameter {
            default: DEFAULT_ENDPOINT.to_string(),
            description: "URL of the embedding service endpoint.".to_string(),
            kind: ParameterType::String,
            validations: vec![],
        },
    );
    parameters.insert(
        PARAM_ENCODING.to_string(),
        Parameter {
            default: ValueEncoding::default().as_str().to_string(),
            description: "How the response is stored: 'raw' keeps the response bytes \
                          (base64 inside structured data), 'json' stores the parsed body."
                .to_string(),
            kind: ParameterType::String,
            validations: vec![Validation::Inclusion(
                [ValueEncoding::Raw, ValueEncoding::Json]
                    .iter()
                    .map(|e| e.as_str().to_string())
                    .collect(),
            )],
        },
    );
    parameters.insert(
        PARAM_ERROR_POLICY.to_string(),
        Parameter {
            default: ErrorPolicy::default().as_str().to_string(),
            description: "'fail-fast' stops the batch at the first failing record, \
                          'isolate' reports every record's outcome."
                .to_string(),
            kind: ParameterType::String,
            validations: vec![Validation::Inclusion(
                [ErrorPolicy::FailFast, ErrorPolicy::Isolate]
                    .iter()
                    .map(|p| p.as_str().to_string())
                    .collect(),
            )],
        },
    );
    parameters.insert(
        PARAM_CHECK_STATUS.to_string(),
        Parameter {
            default: "false".to_string(),
            description: "Treat non-2xx responses from the embedding service as errors."
                .to_string(),
            kind: ParameterType::Bool,
            validations: vec![],
        },
    );

    Specification {
        name: PROCESSOR_NAME.to_string(),
        summary: "Turns a record field into an LLM embedding".to_string(),
        description: "Sends the value of the source field to an embedding service and \
                      writes the response into the target field of the same record."
            .to_string(),
        version: concat!("v", env!("CARGO_PKG_VERSION")).to_string(),
        author: "James Martinez".to_string(),
        parameters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specification_is_stable() {
        assert_eq!(specification(), specification());
    }

    #[test]
    fn specification_lists_required_parameters() {
        let spec = specification();
        assert_eq!(spec.name, "llmEmbedProcessor");
        assert_eq!(spec.version, "v1.0.0");
        assert!(spec.version.starts_with('v'));
        for name in ["source", "target"] {
            assert_eq!(
                spec.parameters[name].validations,
                vec![Validation::Required],
                "{name} should be required"
            );
        }
        assert_eq!(spec.parameters["url"].default, DEFAULT_ENDPOINT);
    }

    #[test]
    fn specification_serializes_validations() {
        let value = serde_json::to_value(specification()).unwrap();
        assert_eq!(
            value["parameters"]["source"]["validations"],
            json!([{"type": "required"}])
        );
        assert_eq!(
            value["parameters"]["encoding"]["validations"],
            json!([{"type": "inclusion", "value": ["raw", "json"]}])
        );
        assert_eq!(value["parameters"]["check_status"]["type"], json!("bool"));
    }

    #[test]
    fn config_schema_requires_source_and_target() {
        let schema = specification().config_schema();
        assert_eq!(schema["required"], json!(["source", "target"]));
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(
            schema["properties"]["error_policy"]["enum"],
            json!(["fail-fast", "isolate"])
        );
        assert_eq!(
            schema["properties"]["check_status"]["enum"],
            json!(["true", "false"])
        );
    }
}
