//! Processor parameters from a TOML file and `--param` overrides.
//!
//! The file is a flat table whose keys are processor parameters:
//!
//! ```toml
//! source = "text"
//! target = "embedding"
//! url = "http://localhost:8091/embedding"
//! check_status = true
//! ```
//!
//! Booleans and integers are accepted and passed on in their string form.

use std::collections::BTreeMap;
use std::path::Path;

/// Read the parameter table in `path`.
pub fn read_params_file(path: &Path) -> Result<BTreeMap<String, String>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    parse_params(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

fn parse_params(content: &str) -> Result<BTreeMap<String, String>, String> {
    let table: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;

    let mut params = BTreeMap::new();
    for (key, value) in table {
        let value = match value {
            toml::Value::String(s) => s,
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Integer(i) => i.to_string(),
            other => {
                return Err(format!(
                    "parameter '{}' must be a string, boolean or integer, found {}",
                    key,
                    other.type_str()
                ))
            }
        };
        params.insert(key, value);
    }
    Ok(params)
}

/// Split a `key=value` override. The value may itself contain `=`.
pub fn parse_override(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", arg)),
    }
}

/// Parameters from the optional file, with overrides applied in order.
pub fn collect_params(
    file: Option<&Path>,
    overrides: &[(String, String)],
) -> Result<BTreeMap<String, String>, String> {
    let mut params = match file {
        Some(path) => read_params_file(path)?,
        None => BTreeMap::new(),
    };
    for (key, value) in overrides {
        params.insert(key.clone(), value.clone());
    }
    Ok(params)
}
