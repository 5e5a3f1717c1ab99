use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The per-call configuration handed to every step.
///
/// A configuration is a JSON object. Systems look up the entry keyed by each
/// step's label and pass it down as that step's own configuration, so nested
/// systems can be configured by nesting objects:
///
/// ```rust
/// use blockwork::Config;
/// use serde_json::json;
///
/// let config = Config::from_value(json!({
///     "TransformingSystem": { "Scale": { "factor": 3 } }
/// }))
/// .unwrap();
///
/// let inner = config.section("TransformingSystem").unwrap();
/// let scale = inner.section("Scale").unwrap();
/// assert_eq!(scale.get("factor"), Some(&json!(3)));
/// assert!(config.section("Missing").unwrap().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(Map<String, Value>);

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from a JSON value, which must be an object or null.
    pub fn from_value(value: Value) -> Result<Self, PipelineError> {
        match value {
            Value::Object(map) => Ok(Config(map)),
            Value::Null => Ok(Config::default()),
            other => Err(PipelineError::InvalidConfig {
                step: "<root>".into(),
                reason: format!("expected an object, got {}", kind(&other)),
            }),
        }
    }

    /// Adds an entry, replacing any previous value under the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the nested configuration for `label`.
    ///
    /// An absent entry yields the empty configuration. An entry that exists
    /// but is not an object cannot be handed to a step and is rejected.
    pub fn section(&self, label: &str) -> Result<Config, PipelineError> {
        match self.0.get(label) {
            None | Some(Value::Null) => Ok(Config::default()),
            Some(Value::Object(map)) => Ok(Config(map.clone())),
            Some(other) => Err(PipelineError::InvalidConfig {
                step: label.to_string(),
                reason: format!("expected an object, got {}", kind(other)),
            }),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
