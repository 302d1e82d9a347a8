//! Policy file loading.
//!
//! Policy files are YAML or JSON. Both are first parsed into a
//! `serde_json::Value`, checked for JSON compatibility (no floats, string
//! keys only), and then deserialized into a [`PolicyDocument`]. Going through
//! one value model means the two formats cannot drift apart and the hash only
//! ever sees parsed data, never source text.
//!
//! A repeated mapping key is a parse error in both formats. YAML refuses it
//! natively; JSON goes through [`UniqueKeys`], since `serde_json::Value` would
//! silently keep the last occurrence.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::Value;

use crate::definition::{PolicyDefinition, PolicyDocument};
use crate::error::PolicyLoadError;
use crate::reason::ReasonCodeRegistry;

/// Source format of a policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    /// YAML 1.2.
    Yaml,
    /// JSON.
    Json,
}

impl PolicyFormat {
    /// Guess from a file extension; anything but `.json` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parses and validates policy documents.
#[derive(Debug, Clone, Default)]
pub struct PolicyLoader {
    registry: ReasonCodeRegistry,
}

impl PolicyLoader {
    /// A loader validating against the standard reason code registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader validating against `registry`.
    pub fn with_registry(registry: ReasonCodeRegistry) -> Self {
        Self { registry }
    }

    /// Load a policy file.
    pub fn load_path(&self, path: &Path) -> Result<PolicyDefinition, PolicyLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PolicyLoadError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                PolicyLoadError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let value = parse_value(&content, PolicyFormat::from_path(path), Some(path))?;
        let definition = self.load_value(value)?;
        tracing::debug!(
            path = %path.display(),
            policy_version = definition.version(),
            policy_hash = %definition.hash(),
            "policy loaded"
        );
        Ok(definition)
    }

    /// Load a policy from text.
    pub fn load_str(&self, text: &str, format: PolicyFormat) -> Result<PolicyDefinition, PolicyLoadError> {
        let value = parse_value(text, format, None)?;
        self.load_value(value)
    }

    /// Build a definition from an already-parsed document.
    pub fn load_document(&self, document: PolicyDocument) -> Result<PolicyDefinition, PolicyLoadError> {
        PolicyDefinition::new(document, &self.registry)
    }

    fn load_value(&self, value: Value) -> Result<PolicyDefinition, PolicyLoadError> {
        ensure_json_compatible(&value, "$")?;
        let document: PolicyDocument =
            serde_json::from_value(value).map_err(PolicyLoadError::Schema)?;
        self.load_document(document)
    }
}

fn parse_value(text: &str, format: PolicyFormat, origin: Option<&Path>) -> Result<Value, PolicyLoadError> {
    let origin = origin.map(PathBuf::from);
    match format {
        PolicyFormat::Json => serde_json::from_str::<UniqueKeys>(text)
            .map(|parsed| parsed.0)
            .map_err(|source| PolicyLoadError::JsonParse { origin, source }),
        PolicyFormat::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(text)
                .map_err(|source| PolicyLoadError::YamlParse { origin, source })?;
            yaml_to_json(yaml, "$")
        }
    }
}

/// A JSON value whose objects never repeat a key.
struct UniqueKeys(Value);

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor).map(UniqueKeys)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value without repeated object keys")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom(format!("non-finite number {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(UniqueKeys(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut obj = serde_json::Map::new();
        while let Some(key) = map.next_key::<String>()? {
            let UniqueKeys(value) = map.next_value()?;
            if obj.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key `{key}`")));
            }
            obj.insert(key, value);
        }
        Ok(Value::Object(obj))
    }
}

/// Parse YAML text into a JSON value.
pub(crate) fn yaml_str_to_json(text: &str) -> Result<Value, PolicyLoadError> {
    parse_value(text, PolicyFormat::Yaml, None)
}

/// Convert a YAML value into JSON.
///
/// Tags are stripped; mapping keys must be strings; floats are rejected.
fn yaml_to_json(yaml: serde_yaml::Value, path: &str) -> Result<Value, PolicyLoadError> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else {
                Err(PolicyLoadError::JsonIncompatible {
                    path: path.to_string(),
                    detail: format!("floats are not allowed; use integers or strings (got {n})"),
                })
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s)),
        serde_yaml::Value::Sequence(seq) => seq
            .into_iter()
            .enumerate()
            .map(|(i, v)| yaml_to_json(v, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        serde_yaml::Value::Mapping(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s,
                    other => {
                        return Err(PolicyLoadError::JsonIncompatible {
                            path: path.to_string(),
                            detail: format!("mapping keys must be strings (got {other:?})"),
                        })
                    }
                };
                let child = yaml_to_json(v, &format!("{path}.{key}"))?;
                obj.insert(key, child);
            }
            Ok(Value::Object(obj))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value, path),
    }
}

/// Reject floats anywhere in a parsed JSON document.
fn ensure_json_compatible(value: &Value, path: &str) -> Result<(), PolicyLoadError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() {
                return Err(PolicyLoadError::JsonIncompatible {
                    path: path.to_string(),
                    detail: format!("floats are not allowed; use integers or strings (got {n})"),
                });
            }
            Ok(())
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, v)| ensure_json_compatible(v, &format!("{path}[{i}]"))),
        Value::Object(map) => map
            .iter()
            .try_for_each(|(k, v)| ensure_json_compatible(v, &format!("{path}.{k}"))),
    }
}
