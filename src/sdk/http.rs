//! Encoded arguments → HTTP request.
//!
//! Takes a compiled operation and its encoded arguments, builds the request
//! for the chosen base URL, and returns the raw response.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::{Map, Number, Value};

use crate::encoder::EncodedArguments;
use crate::error::SdkError;
use crate::schema::{OperationParameter, OperationSchema, ParameterLocation, ParameterValue, PrimitiveType};
use crate::sdk::{InvocationResult, Session};

const JSON_MEDIA: &str = "application/json";

/// Send one operation call.
pub fn send(
    client: &Client,
    base_url: &str,
    session: &Session,
    operation: &OperationSchema,
    arguments: &EncodedArguments,
) -> Result<InvocationResult, SdkError> {
    let route = operation.route.as_ref().ok_or_else(|| SdkError::NoRoute {
        operation: operation.name.clone(),
    })?;
    let method: Method = route
        .method
        .parse()
        .map_err(|_| SdkError::UnsupportedMethod {
            method: route.method.clone(),
        })?;

    let url = build_url(base_url, &route.path, operation, arguments)?;
    let query_pairs = build_query_pairs(operation, arguments);
    let headers = collect_headers(operation, arguments)?;

    let mut req = client.request(method, &url);

    if let Some(credentials) = &session.credentials {
        req = req.basic_auth(&credentials.access_key_id, Some(&credentials.secret_key));
    }
    if !query_pairs.is_empty() {
        req = req.query(&query_pairs);
    }
    for (name, value) in headers {
        req = req.header(name, value);
    }
    req = match build_body(operation, arguments) {
        Some(RequestBody::Json(body)) => req.json(&body),
        Some(RequestBody::Raw { content_type, text }) => {
            req.header(CONTENT_TYPE, content_type).body(text)
        }
        None => req,
    };

    send_request(req)
}

fn params_in<'a>(
    operation: &'a OperationSchema,
    location: ParameterLocation,
) -> impl Iterator<Item = &'a OperationParameter> {
    operation
        .parameters
        .values()
        .filter(move |p| p.location == location)
}

/// Query, path and header values go over the wire as plain text.
fn wire_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn build_url(
    base_url: &str,
    path: &str,
    operation: &OperationSchema,
    arguments: &EncodedArguments,
) -> Result<String, SdkError> {
    let base = base_url.trim_end_matches('/');
    let mut url = format!("{base}{path}");
    for param in params_in(operation, ParameterLocation::Path) {
        let value = arguments
            .get(&param.name)
            .ok_or_else(|| SdkError::MissingPathParameter {
                name: param.name.clone(),
            })?;
        url = url.replace(
            &format!("{{{}}}", param.name),
            &urlencoding::encode(&wire_text(value)),
        );
    }
    Ok(url)
}

fn build_query_pairs(operation: &OperationSchema, arguments: &EncodedArguments) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for param in params_in(operation, ParameterLocation::Query) {
        match arguments.get(&param.name) {
            Some(Value::Array(items)) => {
                pairs.extend(items.iter().map(|item| (param.name.clone(), wire_text(item))));
            }
            Some(value) => pairs.push((param.name.clone(), wire_text(value))),
            None => {}
        }
    }
    pairs
}

fn collect_headers(
    operation: &OperationSchema,
    arguments: &EncodedArguments,
) -> Result<Vec<(HeaderName, HeaderValue)>, SdkError> {
    let mut headers = Vec::new();
    for param in params_in(operation, ParameterLocation::Header) {
        let Some(value) = arguments.get(&param.name) else {
            continue;
        };
        let invalid = || SdkError::InvalidHeader {
            name: param.name.clone(),
        };
        let name = HeaderName::try_from(param.name.as_str()).map_err(|_| invalid())?;
        let value = HeaderValue::try_from(wire_text(value)).map_err(|_| invalid())?;
        headers.push((name, value));
    }
    Ok(headers)
}

#[derive(Debug, PartialEq)]
enum RequestBody {
    Json(Value),
    Raw { content_type: String, text: String },
}

/// The payload parameter when given, else an object of the supplied body
/// properties.
fn build_body(operation: &OperationSchema, arguments: &EncodedArguments) -> Option<RequestBody> {
    for param in params_in(operation, ParameterLocation::Payload) {
        let Some(value) = arguments.get(&param.name) else {
            continue;
        };
        let content_type = payload_content_type(operation, param, arguments);
        let body = match value {
            Value::String(text) if !is_json_media(&content_type) => RequestBody::Raw {
                content_type,
                text: text.clone(),
            },
            other if content_type == JSON_MEDIA => RequestBody::Json(other.clone()),
            other => RequestBody::Raw {
                content_type,
                text: other.to_string(),
            },
        };
        return Some(body);
    }

    let mut object = Map::new();
    for param in params_in(operation, ParameterLocation::Body) {
        if let Some(value) = arguments.get(&param.name) {
            object.insert(param.name.clone(), coerce(param, value));
        }
    }
    (!object.is_empty()).then_some(RequestBody::Json(Value::Object(object)))
}

fn is_json_media(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    essence == JSON_MEDIA || essence.ends_with("+json")
}

/// Chosen by the content type selector, else the schema's default, else
/// the payload's first content type.
fn payload_content_type(
    operation: &OperationSchema,
    payload: &OperationParameter,
    arguments: &EncodedArguments,
) -> String {
    let mut selectors = params_in(operation, ParameterLocation::ContentType);
    let selected = selectors.next().and_then(|selector| {
        arguments
            .get(&selector.name)
            .or_else(|| selector.schema().and_then(|s| s.default.as_ref()))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    });

    selected
        .or_else(|| match &payload.value {
            ParameterValue::Content(variants) => variants.keys().next().cloned(),
            ParameterValue::Schema(_) => None,
        })
        .unwrap_or_else(|| JSON_MEDIA.to_string())
}

/// Scalars arrive as the user's strings; JSON bodies want native types.
fn coerce(param: &OperationParameter, value: &Value) -> Value {
    let (Some(kind), Value::String(text)) = (param.schema().and_then(|s| s.primitive_type()), value) else {
        return value.clone();
    };
    let coerced = match kind {
        PrimitiveType::Integer => text.parse::<i64>().ok().map(Value::from),
        PrimitiveType::Number => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        PrimitiveType::Boolean => text.parse::<bool>().ok().map(Value::Bool),
        PrimitiveType::String => None,
    };
    coerced.unwrap_or_else(|| value.clone())
}

fn send_request(req: RequestBuilder) -> Result<InvocationResult, SdkError> {
    let resp = req.send().map_err(SdkError::RequestFailed)?;
    let status = resp.status();
    let body = resp.text().map_err(SdkError::ResponseRead)?;

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SdkError::Authentication {
            status: status.as_u16(),
            body,
        });
    }
    if !status.is_success() {
        return Err(SdkError::Remote {
            status: status.as_u16(),
            body,
        });
    }

    Ok(InvocationResult {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::Credentials;
    use mockito::Matcher;
    use serde_json::json;

    fn session() -> Session {
        Session {
            profile: "default".into(),
            credentials: Some(Credentials {
                access_key_id: "AK".into(),
                secret_key: "SK".into(),
            }),
            residency: "default".into(),
            endpoint: "production".into(),
            base_url: None,
        }
    }

    fn operation(method: &str, path: &str, parameters: Value) -> OperationSchema {
        OperationSchema::from_spec(
            "test_op",
            &json!({ "method": method, "path": path, "parameters": parameters }),
        )
        .unwrap()
    }

    fn args(value: Value) -> EncodedArguments {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn sends_get_with_path_query_and_auth() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/pods/hello%20world")
            .match_query(Matcher::Exact("tag=a&tag=b&verbose=true".into()))
            .match_header("authorization", "Basic QUs6U0s=")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"123"}"#)
            .create();

        let op = operation(
            "GET",
            "/pods/{podId}",
            json!({
                "podId": { "in": "path", "required": true, "schema": { "type": "string" } },
                "tag": { "in": "query", "schema": { "type": "array", "items": { "type": "string" } } },
                "verbose": { "in": "query", "schema": { "type": "boolean" } }
            }),
        );
        let arguments = args(json!({ "podId": "hello world", "tag": ["a", "b"], "verbose": true }));

        let result = send(&Client::new(), &server.url(), &session(), &op, &arguments).unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(result.json(), Some(json!({"id": "123"})));
        mock.assert();
    }

    #[test]
    fn body_properties_are_coerced_to_native_types() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/pods")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"name": "x", "limit": 5, "ratio": 0.5, "spec": {"a": "1"}})))
            .with_status(201)
            .with_body(r#"{"id":"new"}"#)
            .create();

        let op = operation(
            "POST",
            "/pods",
            json!({
                "name": { "in": "body", "schema": { "type": "string" } },
                "limit": { "in": "body", "schema": { "type": "integer" } },
                "ratio": { "in": "body", "schema": { "type": "number" } },
                "spec": { "in": "body", "schema": { "type": "object" } }
            }),
        );
        let arguments = args(json!({ "name": "x", "limit": "5", "ratio": "0.5", "spec": {"a": "1"} }));

        let result = send(&Client::new(), &server.url(), &session(), &op, &arguments).unwrap();
        assert_eq!(result.status, 201);
        mock.assert();
    }

    #[test]
    fn payload_uses_selected_content_type() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/import")
            .match_header("content-type", "text/csv")
            .match_body("a,b\n1,2")
            .with_status(204)
            .create();

        let op = operation(
            "PUT",
            "/import",
            json!({
                "body": {
                    "in": "payload",
                    "content": {
                        "application/json": { "schema": { "type": "array", "items": { "type": "object" } } },
                        "text/csv": { "schema": { "type": "string" } }
                    }
                },
                "content_type": {
                    "in": "content_type",
                    "schema": { "type": "string", "enum": ["application/json", "text/csv"], "default": "application/json" }
                }
            }),
        );
        let arguments = args(json!({ "body": "a,b\n1,2", "content_type": "text/csv" }));

        let result = send(&Client::new(), &server.url(), &session(), &op, &arguments).unwrap();
        assert_eq!(result.status, 204);
        assert_eq!(result.json(), None);
        mock.assert();
    }

    #[test]
    fn headers_are_sent_and_auth_omitted_without_credentials() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/test")
            .match_header("X-Request-Id", "abc123")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("{}")
            .create();

        let op = operation(
            "GET",
            "/test",
            json!({ "X-Request-Id": { "in": "header", "schema": { "type": "string" } } }),
        );
        let anonymous = Session {
            credentials: None,
            ..session()
        };

        send(&Client::new(), &server.url(), &anonymous, &op, &args(json!({"X-Request-Id": "abc123"}))).unwrap();
        mock.assert();
    }

    #[test]
    fn access_denied_is_distinguished() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/secret")
            .with_status(403)
            .with_body("forbidden")
            .create();

        let op = operation("GET", "/secret", json!({}));
        let err = send(&Client::new(), &server.url(), &session(), &op, &args(json!({}))).unwrap_err();
        assert!(matches!(err, SdkError::Authentication { status: 403, ref body } if body == "forbidden"));
    }

    #[test]
    fn non_success_status_is_remote_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/fail")
            .with_status(404)
            .with_body("not found")
            .create();

        let op = operation("GET", "/fail", json!({}));
        let err = send(&Client::new(), &server.url(), &session(), &op, &args(json!({}))).unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404: not found");
    }

    #[test]
    fn missing_path_value_is_an_error() {
        let op = operation(
            "GET",
            "/pods/{podId}",
            json!({ "podId": { "in": "path", "required": true, "schema": { "type": "string" } } }),
        );
        let err = build_url("http://h", "/pods/{podId}", &op, &args(json!({}))).unwrap_err();
        assert!(matches!(err, SdkError::MissingPathParameter { ref name } if name == "podId"));
    }

    #[test]
    fn no_body_without_body_arguments() {
        let op = operation(
            "POST",
            "/pods",
            json!({ "name": { "in": "body", "schema": { "type": "string" } } }),
        );
        assert_eq!(build_body(&op, &args(json!({}))), None);
    }

    #[test]
    fn unsupported_method_is_rejected() {
        let op = operation("FROB LICATE", "/x", json!({}));
        let err = send(&Client::new(), "http://127.0.0.1:9", &session(), &op, &args(json!({}))).unwrap_err();
        assert!(matches!(err, SdkError::UnsupportedMethod { .. }));
    }
}
