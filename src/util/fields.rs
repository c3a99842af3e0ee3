//! Header-to-field mapping.
//!
//! Every parsed header is `Serialize`; [`to_field_map`] flattens one into an
//! ordered `name -> value` map for key/value display and scripting.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::MobiError;

/// Convert a serializable struct into a sorted field map.
///
/// Non-object values (a bare number or string) are rejected since they have
/// no field names.
///
/// ```
/// use mobi::util::fields::to_field_map;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Header { magic: &'static str, header_length: u32 }
///
/// let map = to_field_map(&Header { magic: "MOBI", header_length: 264 }).unwrap();
/// assert_eq!(map["magic"], "MOBI");
/// assert_eq!(map["header_length"], 264);
/// ```
pub fn to_field_map<T: Serialize>(value: &T) -> Result<BTreeMap<String, Value>, MobiError> {
    match serde_json::to_value(value)
        .map_err(|e| MobiError::Format(format!("Cannot serialize fields: {}", e)))?
    {
        Value::Object(obj) => Ok(obj.into_iter().collect()),
        other => Err(MobiError::Argument(format!(
            "Expected a struct, got {}",
            match other {
                Value::Null => "null",
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a number",
                Value::String(_) => "a string",
                Value::Array(_) => "an array",
                Value::Object(_) => "an object",
            }
        ))),
    }
}

/// Render a field value for plain-text output (`null` becomes `-`).
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
