use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::domain::DomainError;

/// A caller-supplied output schema: any type that can describe its own
/// structure and be constructed from a decoded JSON mapping.
///
/// Implemented automatically for every `Deserialize + JsonSchema` type; the
/// provided methods are pure functions of their input and never leave a
/// partially constructed value behind.
pub trait OutputSchema: DeserializeOwned + JsonSchema {
    /// Renders the JSON schema as a deterministic description string,
    /// suitable for embedding verbatim into a prompt.
    fn describe() -> String {
        let schema = schema_for!(Self);
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    }

    /// Constructs a typed value from a decoded key/value mapping.
    fn from_map(map: Map<String, Value>) -> Result<Self, DomainError> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| DomainError::validation(e.to_string()))
    }

    /// Decodes raw model output into a mapping, then constructs the typed
    /// value. Malformed or non-object text is a decode failure; a
    /// well-formed mapping that does not fit the schema is a validation
    /// failure.
    fn from_raw(raw: &str) -> Result<Self, DomainError> {
        let map = decode_object(raw)?;
        Self::from_map(map)
    }
}

impl<T: DeserializeOwned + JsonSchema> OutputSchema for T {}

/// Decodes raw text as a generic JSON key/value mapping.
pub fn decode_object(raw: &str) -> Result<Map<String, Value>, DomainError> {
    serde_json::from_str::<Map<String, Value>>(raw)
        .map_err(|e| DomainError::decode(format!("response is not a JSON object: {e}")))
}
