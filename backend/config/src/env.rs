//! Environment variable substitution for provider config values.
//!
//! `${VAR_NAME}` references in string values are resolved at load time.
//! An unset variable becomes an empty string and is reported back so the
//! validator can point at it (a blank `api_key` is then rejected).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// A `${VAR}` reference that had no value in the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVar {
    pub var_name: String,
    pub config_path: String,
}

/// Result of a substitution pass.
#[derive(Debug, Clone)]
pub struct EnvResolution {
    pub value: Value,
    pub missing: Vec<MissingEnvVar>,
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> EnvResolution {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute env vars using a provided map.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> EnvResolution {
    let mut missing = Vec::new();
    let value = substitute_value(value, env, "", &mut missing);
    EnvResolution { value, missing }
}

fn substitute_value(
    value: &Value,
    env: &HashMap<String, String>,
    path: &str,
    missing: &mut Vec<MissingEnvVar>,
) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_string(s, env, path, missing)),
        Value::Array(arr) => Value::Array(
            arr.iter()
                .enumerate()
                .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]"), missing))
                .collect(),
        ),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path, missing));
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}

fn substitute_string(
    s: &str,
    env: &HashMap<String, String>,
    path: &str,
    missing: &mut Vec<MissingEnvVar>,
) -> String {
    if !s.contains("${") {
        return s.to_string();
    }

    ENV_VAR_PATTERN
        .replace_all(s, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match env.get(var_name) {
                Some(val) => val.clone(),
                None => {
                    missing.push(MissingEnvVar {
                        var_name: var_name.to_string(),
                        config_path: path.to_string(),
                    });
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Collect all env var names referenced in a config value tree.
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    let mut vars = Vec::new();
    collect_vars_recursive(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

fn collect_vars_recursive(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in ENV_VAR_PATTERN.captures_iter(s) {
                out.push(caps[1].to_string());
            }
        }
        Value::Array(arr) => arr.iter().for_each(|v| collect_vars_recursive(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_vars_recursive(v, out)),
        _ => {}
    }
}
