//! Raw flag values → typed operation arguments.
//!
//! Scalars stay as the strings the user typed; the remote API owns their
//! validation. Object parameters accept JSON, or as a shell-friendly
//! fallback a flat `key=value,key=value` list. The fallback has no escaping:
//! values cannot contain literal commas, keys cannot contain equals signs,
//! there is no nesting, and every value is a string.
//!
//! Any value of the form `file://<path>` is replaced with the contents of
//! that file before it is interpreted.

use std::borrow::Cow;
use std::fs;

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::error::EncodingError;
use crate::schema::{OperationParameter, OperationSchema, ParameterValue, PrimitiveType, Shape};

const FILE_REFERENCE_PREFIX: &str = "file://";

/// A flag value as it came out of the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// A single value.
    Text(String),
    /// One or more values, already coerced to their item type.
    Items(Vec<Value>),
    /// A zero-argument toggle.
    Switch(bool),
}

/// Operation arguments ready for the invoker, in parameter declaration order.
pub type EncodedArguments = IndexMap<String, Value>;

/// Encode every supplied flag of one invocation.
pub fn encode_arguments(
    operation: &OperationSchema,
    flags: IndexMap<String, RawValue>,
) -> Result<EncodedArguments, EncodingError> {
    let mut flags = flags;
    let mut encoded = EncodedArguments::new();

    for name in operation.parameters.keys() {
        if let Some(raw) = flags.shift_remove(name) {
            let value = encode(operation, name, raw)?;
            encoded.insert(name.clone(), value);
        }
    }

    // Anything left was never declared by the operation.
    if let Some((name, _)) = flags.into_iter().next() {
        return Err(EncodingError::UnknownParameter { name });
    }

    Ok(encoded)
}

/// Encode one parameter value according to its schema.
pub fn encode(
    operation: &OperationSchema,
    param_name: &str,
    raw: RawValue,
) -> Result<Value, EncodingError> {
    let param = operation
        .parameter(param_name)
        .ok_or_else(|| EncodingError::UnknownParameter {
            name: param_name.to_string(),
        })?;

    match raw {
        RawValue::Switch(on) => Ok(Value::Bool(on)),
        RawValue::Items(items) => {
            let kind = item_type(param);
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) if text.starts_with(FILE_REFERENCE_PREFIX) => {
                        encode_file_item(param, kind, &text)
                    }
                    other => Ok(other),
                })
                .collect::<Result<Vec<_>, EncodingError>>()
                .map(Value::Array)
        }
        RawValue::Text(text) => {
            let text = read_file_reference(&text)?;
            encode_text(param, &text)
        }
    }
}

fn item_type(param: &OperationParameter) -> Option<PrimitiveType> {
    match &param.schema()?.shape {
        Shape::Array { items: Some(items) } => items.primitive_type(),
        _ => None,
    }
}

/// A list item read from a file gets the same coercion as a typed one.
fn encode_file_item(
    param: &OperationParameter,
    kind: Option<PrimitiveType>,
    reference: &str,
) -> Result<Value, EncodingError> {
    let contents = read_file_reference(reference)?;
    let Some(kind) = kind else {
        return Ok(Value::String(contents.into_owned()));
    };
    match coerce_item(kind, &contents) {
        Some(value) => Ok(value),
        None => Err(EncodingError::InvalidItem {
            name: param.name.clone(),
            kind: kind.as_str(),
            value: contents.into_owned(),
        }),
    }
}

/// Parse one list item as `kind`. Strings are kept verbatim; other types
/// ignore surrounding whitespace.
pub fn coerce_item(kind: PrimitiveType, raw: &str) -> Option<Value> {
    match kind {
        PrimitiveType::String => Some(Value::String(raw.to_string())),
        PrimitiveType::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
        PrimitiveType::Number => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        PrimitiveType::Boolean => raw.trim().parse::<bool>().ok().map(Value::Bool),
    }
}

fn encode_text(param: &OperationParameter, text: &str) -> Result<Value, EncodingError> {
    let schema = match &param.value {
        ParameterValue::Schema(schema) => schema,
        ParameterValue::Content(_) => {
            return Ok(serde_json::from_str(text)
                .unwrap_or_else(|_| Value::String(text.to_string())));
        }
    };

    match &schema.shape {
        Shape::Object { .. } => match serde_json::from_str(text) {
            Ok(value) => Ok(value),
            Err(json_error) => decode_key_value_pairs(text)
                .map(Value::Object)
                .map_err(|segment| EncodingError::InvalidObject {
                    name: param.name.clone(),
                    segment,
                    json_error,
                }),
        },
        // One JSON document stands for the whole array.
        Shape::Array { items: Some(items) } if !items.is_primitive() => serde_json::from_str(text)
            .map_err(|source| EncodingError::InvalidJson {
                name: param.name.clone(),
                source,
            }),
        _ => Ok(Value::String(text.to_string())),
    }
}

/// Substitute a `file://` reference with the referenced file's contents.
pub fn read_file_reference(raw: &str) -> Result<Cow<'_, str>, EncodingError> {
    let Some(path) = raw.strip_prefix(FILE_REFERENCE_PREFIX) else {
        return Ok(Cow::Borrowed(raw));
    };
    tracing::debug!(path, "reading parameter value from file");
    fs::read_to_string(path)
        .map(Cow::Owned)
        .map_err(|source| EncodingError::FileReference {
            path: path.to_string(),
            source,
        })
}

/// Decode `key=value,key=value`.
///
/// Splits on commas, then on the first `=` of each segment, trimming
/// whitespace. Empty segments are skipped. On failure returns the segment
/// that has no `=`.
pub fn decode_key_value_pairs(raw: &str) -> Result<Map<String, Value>, String> {
    let mut map = Map::new();
    for segment in raw.split(',') {
        if segment.trim().is_empty() {
            continue;
        }
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| segment.trim().to_string())?;
        map.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
    }
    Ok(map)
}
