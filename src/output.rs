//! Printing operation results.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::error::CliError;
use crate::sdk::InvocationResult;

const INDENT: &[u8] = b"    ";

/// Text to print for a successful call.
///
/// JSON bodies are filtered through `query` (a JMESPath expression) and
/// pretty-printed with sorted keys. Anything else prints the status code.
pub fn format_result(result: &InvocationResult, query: Option<&str>) -> Result<String, CliError> {
    let Some(body) = result.json() else {
        tracing::debug!(status = result.status, "response body is not JSON");
        return Ok(result.status.to_string());
    };

    let value = match query {
        Some(expression) => apply_query(expression, &body)?,
        None => body,
    };
    pretty(&sort_keys(value))
}

pub fn apply_query(expression: &str, data: &Value) -> Result<Value, CliError> {
    let query_error = |source| CliError::Query {
        expression: expression.to_string(),
        source,
    };
    let compiled = jmespath::compile(expression).map_err(query_error)?;
    let found = compiled.search(data).map_err(query_error)?;
    serde_json::to_value(&*found).map_err(CliError::Format)
}

/// Object keys in lexical order at every depth.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

fn pretty(value: &Value) -> Result<String, CliError> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut serializer).map_err(CliError::Format)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result(body: &str) -> InvocationResult {
        InvocationResult {
            status: 200,
            body: body.to_string(),
        }
    }

    #[test]
    fn keys_are_sorted_with_four_space_indent() {
        let text = format_result(&result(r#"{"b": 1, "a": {"z": true, "y": [1]}}"#), None).unwrap();
        assert_eq!(
            text,
            "{\n    \"a\": {\n        \"y\": [\n            1\n        ],\n        \"z\": true\n    },\n    \"b\": 1\n}"
        );
    }

    #[test]
    fn query_filters_before_printing() {
        let body = r#"{"users": [{"name": "ada", "id": 1}, {"name": "bob", "id": 2}]}"#;
        let text = format_result(&result(body), Some("users[].name")).unwrap();
        assert_eq!(text, "[\n    \"ada\",\n    \"bob\"\n]");
    }

    #[test]
    fn invalid_query_names_the_expression() {
        let err = format_result(&result("{}"), Some("users[")).unwrap_err();
        match err {
            CliError::Query { expression, .. } => assert_eq!(expression, "users["),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_json_body_prints_status() {
        let text = format_result(
            &InvocationResult {
                status: 204,
                body: String::new(),
            },
            Some("ignored"),
        )
        .unwrap();
        assert_eq!(text, "204");
    }
}
