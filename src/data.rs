use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::value::{Number, Value};

/// Where the bound data comes from. The binder normalizes all three into
/// the same [`Value`] model, so the evaluator never knows the origin.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A JSON document passed inline (e.g. `-d '{"name":"x"}'`).
    Inline(String),
    /// A JSON or YAML file; the format is picked by extension
    /// (`.yaml`/`.yml` is YAML, anything else JSON).
    File(PathBuf),
    /// A JSON document piped through standard input.
    Stdin,
    /// Environment variables starting with the prefix. The prefix is
    /// stripped and values are bound as strings.
    EnvPrefix(String),
}

pub fn bind(source: &DataSource) -> Result<Value> {
    match source {
        DataSource::Inline(json) => parse_json(json, "inline data"),
        DataSource::File(path) => bind_file(path),
        DataSource::Stdin => bind_stdin(),
        DataSource::EnvPrefix(prefix) => bind_env(prefix, env::vars()),
    }
}

fn parse_json(text: &str, what: &str) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Error::data(format!("invalid JSON in {}: {}", what, e)))?;
    Ok(Value::from(json))
}

fn bind_file(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::data(format!("cannot read data file {}: {}", path.display(), e))
    })?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
            .map_err(|e| Error::data(format!("invalid YAML in {}: {}", path.display(), e)))?;
        from_yaml(yaml)
    } else {
        parse_json(&content, &format!("data file {}", path.display()))
    }
}

fn bind_stdin() -> Result<Value> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| Error::data(format!("cannot read data from stdin: {}", e)))?;
    parse_json(&buffer, "stdin data")
}

fn bind_env(prefix: &str, vars: impl Iterator<Item = (String, String)>) -> Result<Value> {
    // An empty prefix would bind the whole process environment, which is
    // never what the caller meant.
    if prefix.is_empty() {
        return Err(Error::data("environment variable prefix must not be empty"));
    }

    let mut matched: Vec<(String, String)> = vars
        .filter_map(|(name, value)| {
            let key = name.strip_prefix(prefix)?;
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value))
        })
        .collect();

    if matched.is_empty() {
        return Err(Error::data(format!(
            "no environment variables match prefix `{}`",
            prefix
        )));
    }

    // Process environment order is unspecified; sort for determinism.
    matched.sort();

    let mut map = IndexMap::new();
    for (key, value) in matched {
        map.insert(key, Value::String(value));
    }
    Ok(Value::Mapping(map))
}

fn from_yaml(yaml: serde_yaml::Value) -> Result<Value> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(Number::Int(i)))
            } else {
                Ok(Value::Number(Number::Float(n.as_f64().unwrap_or(f64::NAN))))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s)),
        serde_yaml::Value::Sequence(items) => Ok(Value::Sequence(
            items.into_iter().map(from_yaml).collect::<Result<_>>()?,
        )),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = IndexMap::new();
            for (key, value) in mapping {
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    other => {
                        return Err(Error::data(format!(
                            "YAML mapping keys must be strings, got {:?}",
                            other
                        )))
                    }
                };
                map.insert(key, from_yaml(value)?);
            }
            Ok(Value::Mapping(map))
        }
        serde_yaml::Value::Tagged(tagged) => Err(Error::data(format!(
            "unsupported YAML tag {}",
            tagged.tag
        ))),
    }
}
