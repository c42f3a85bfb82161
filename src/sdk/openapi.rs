//! OpenAPI documents → service definitions.
//!
//! Each service is one OpenAPI 3 document in the API directory, named after
//! the file stem. Documents are read only when a service is described; local
//! `$ref`s are inlined and every operation is flattened into the normalized
//! operation document that [`OperationSchema::from_spec`] compiles.

use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use reqwest::blocking::Client;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::encoder::EncodedArguments;
use crate::error::SdkError;
use crate::schema::OperationSchema;
use crate::sdk::region::{self, ENDPOINTS, RESIDENCIES};
use crate::sdk::session::{Session, SessionOptions};
use crate::sdk::{http, ApiSdk, InvocationResult, ServiceDefinition};

const DOCUMENT_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];
const METHODS: [&str; 8] = [
    "get", "post", "put", "patch", "delete", "head", "options", "trace",
];

/// Name of the parameter carrying a whole, non-flattened request body.
pub const PAYLOAD_PARAMETER: &str = "body";
/// Name of the synthetic selector between several body content types.
pub const CONTENT_TYPE_PARAMETER: &str = "content_type";

/// [`ApiSdk`] over a directory of OpenAPI documents.
pub struct OpenApiSdk {
    api_dir: PathBuf,
    config: Config,
    client: Client,
}

impl OpenApiSdk {
    pub fn new(api_dir: impl Into<PathBuf>, config: Config) -> Result<Self, SdkError> {
        let client = Client::builder()
            .user_agent(concat!("svccli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SdkError::Client)?;
        Ok(Self {
            api_dir: api_dir.into(),
            config,
            client,
        })
    }

    fn document_path(&self, service: &str) -> Result<PathBuf, SdkError> {
        DOCUMENT_EXTENSIONS
            .iter()
            .map(|ext| self.api_dir.join(format!("{service}.{ext}")))
            .find(|path| path.is_file())
            .ok_or_else(|| SdkError::UnknownService {
                name: service.to_string(),
            })
    }
}

impl ApiSdk for OpenApiSdk {
    fn list_services(&self) -> Result<Vec<String>, SdkError> {
        let read_error = |source| SdkError::DirectoryRead {
            path: self.api_dir.clone(),
            source,
        };
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.api_dir).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            let is_document = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e));
            if !is_document {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn describe_service(&self, name: &str) -> Result<ServiceDefinition, SdkError> {
        let path = self.document_path(name)?;
        let document = load_document(&path)?;
        Ok(describe_document(name, &document))
    }

    fn open_session(&self, options: &SessionOptions) -> Result<Session, SdkError> {
        Ok(Session::resolve(options, &self.config, |key| {
            std::env::var(key).ok()
        })?)
    }

    fn invoke(
        &self,
        session: &Session,
        service: &str,
        operation: &OperationSchema,
        arguments: &EncodedArguments,
    ) -> Result<InvocationResult, SdkError> {
        let route = operation.route.as_ref().ok_or_else(|| SdkError::NoRoute {
            operation: operation.name.clone(),
        })?;

        let base_url = match &session.base_url {
            Some(url) => url.clone(),
            None => region::select_server(&route.servers, &session.endpoint, &session.residency)
                .map(|server| server.url.clone())
                .ok_or_else(|| SdkError::NoServer {
                    endpoint: session.endpoint.clone(),
                    residency: session.residency.clone(),
                })?,
        };

        tracing::debug!(
            service,
            operation = %operation.name,
            method = %route.method,
            %base_url,
            "invoking operation"
        );
        http::send(&self.client, &base_url, session, operation, arguments)
    }

    fn residencies(&self) -> Vec<String> {
        RESIDENCIES.iter().map(|r| r.to_string()).collect()
    }

    fn endpoints(&self) -> Vec<String> {
        ENDPOINTS.iter().map(|e| e.to_string()).collect()
    }
}

/// Read a JSON or YAML document, picking the parser by extension.
pub fn load_document(path: &Path) -> Result<Value, SdkError> {
    let text = fs::read_to_string(path).map_err(|source| SdkError::DocumentRead {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let parsed: Result<Value, Box<dyn StdError + Send + Sync>> = if is_json {
        serde_json::from_str(&text).map_err(|e| e.into())
    } else {
        serde_yaml_ng::from_str(&text).map_err(|e| e.into())
    };
    parsed.map_err(|source| SdkError::DocumentParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Build a service definition from a raw OpenAPI document.
pub fn describe_document(name: &str, document: &Value) -> ServiceDefinition {
    let document = resolve_refs(document);
    let info = document.get("info");
    let description = info
        .and_then(|i| i.get("description"))
        .or_else(|| info.and_then(|i| i.get("title")))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    ServiceDefinition {
        name: name.to_string(),
        description,
        operations: extract_operations(&document),
    }
}

/// Inline every local `#/...` reference. A reference back into its own
/// expansion is replaced by an opaque object.
pub fn resolve_refs(document: &Value) -> Value {
    resolve_node(document, document, &mut Vec::new())
}

fn resolve_node(node: &Value, root: &Value, stack: &mut Vec<String>) -> Value {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(|r| r.as_str()) {
                if stack.iter().any(|seen| seen == reference) {
                    return json!({
                        "type": "object",
                        "description": format!("Recursive reference to {reference}"),
                    });
                }
                let target = reference.strip_prefix('#').and_then(|ptr| root.pointer(ptr));
                let Some(target) = target else {
                    tracing::warn!(reference, "unresolved $ref");
                    return node.clone();
                };
                stack.push(reference.to_string());
                let resolved = resolve_node(target, root, stack);
                stack.pop();
                return resolved;
            }
            Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), resolve_node(value, root, stack)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_node(item, root, stack))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Extract every operation of a dereferenced document, keyed by
/// `operationId`, in document order.
pub fn extract_operations(document: &Value) -> IndexMap<String, Value> {
    let mut operations = IndexMap::new();

    let Some(paths) = document.get("paths").and_then(|p| p.as_object()) else {
        return operations;
    };
    let document_servers = document.get("servers");

    for (path, path_item) in paths {
        for method in METHODS {
            let Some(operation) = path_item.get(method) else {
                continue;
            };
            let Some(operation_id) = operation
                .get("operationId")
                .and_then(|v| v.as_str())
                .filter(|id| !id.is_empty())
            else {
                tracing::warn!(%path, method, "skipping operation without operationId");
                continue;
            };
            if operations.contains_key(operation_id) {
                tracing::warn!(operation_id, "skipping duplicate operationId");
                continue;
            }

            let servers = operation
                .get("servers")
                .or_else(|| path_item.get("servers"))
                .or(document_servers)
                .cloned()
                .unwrap_or_else(|| json!([]));

            let normalized = normalize_operation(path, method, operation, path_item, servers);
            operations.insert(operation_id.to_string(), normalized);
        }
    }

    operations
}

fn normalize_operation(
    path: &str,
    method: &str,
    operation: &Value,
    path_item: &Value,
    servers: Value,
) -> Value {
    let description = operation
        .get("description")
        .or_else(|| operation.get("summary"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let mut parameters = collect_params(
        path,
        path_item.get("parameters"),
        operation.get("parameters"),
    );
    extract_body(operation, &mut parameters);

    let mut normalized = Map::new();
    normalized.insert("operationId".into(), operation["operationId"].clone());
    normalized.insert("description".into(), json!(description));
    normalized.insert("method".into(), json!(method));
    normalized.insert("path".into(), json!(path));
    normalized.insert("servers".into(), servers);
    normalized.insert(
        "parameters".into(),
        Value::Object(parameters.into_iter().collect()),
    );
    if let Some(response) = extract_response(operation) {
        normalized.insert("response".into(), response);
    }
    Value::Object(normalized)
}

/// Merge path-level and operation-level parameters; the operation wins.
/// Path parameters come first in template order, then query and header
/// parameters by name. A name shared by a query and a header parameter
/// resolves to the one declared first.
fn collect_params(
    path: &str,
    path_level: Option<&Value>,
    operation_level: Option<&Value>,
) -> IndexMap<String, Value> {
    let mut param_map: IndexMap<(String, String), Value> = IndexMap::new();

    for source in [path_level, operation_level].into_iter().flatten() {
        for param in source.as_array().into_iter().flatten() {
            if let Some((name, location, entry)) = parse_param(param) {
                param_map.insert((name, location), entry);
            }
        }
    }

    let mut path_params = Vec::new();
    let mut other_params = Vec::new();
    for ((name, location), entry) in param_map {
        match location.as_str() {
            "path" => path_params.push((name, entry)),
            "query" | "header" => other_params.push((name, entry)),
            _ => tracing::debug!(%name, %location, "skipping parameter"),
        }
    }

    path_params.sort_by_cached_key(|(name, _)| path.find(&format!("{{{name}}}")).unwrap_or(usize::MAX));
    other_params.sort_by(|a, b| a.0.cmp(&b.0));

    let mut params = IndexMap::new();
    for (name, entry) in path_params.into_iter().chain(other_params) {
        if params.contains_key(&name) {
            tracing::warn!(%name, "parameter name used in two locations; keeping the first");
            continue;
        }
        params.insert(name, entry);
    }
    params
}

fn parse_param(param: &Value) -> Option<(String, String, Value)> {
    let name = param.get("name")?.as_str()?.to_string();
    let location = param.get("in")?.as_str()?.to_string();
    let required = param
        .get("required")
        .and_then(|v| v.as_bool())
        .unwrap_or(location == "path");
    let schema = param
        .get("schema")
        .cloned()
        .unwrap_or_else(|| json!({"type": "string"}));

    let mut entry = Map::new();
    entry.insert("in".into(), json!(location));
    entry.insert("required".into(), json!(required));
    if let Some(description) = param.get("description").and_then(|v| v.as_str()) {
        entry.insert("description".into(), json!(description));
    }
    entry.insert("schema".into(), schema);

    Some((name, location, Value::Object(entry)))
}

fn is_json_media(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    essence == "application/json" || essence.ends_with("+json")
}

/// Flatten a single JSON object body into `body` parameters; anything else
/// becomes one payload parameter.
fn extract_body(operation: &Value, params: &mut IndexMap<String, Value>) {
    let Some(request_body) = operation.get("requestBody") else {
        return;
    };
    let body_required = request_body
        .get("required")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let Some(content) = request_body.get("content").and_then(|c| c.as_object()) else {
        return;
    };

    let entries: Vec<_> = content.iter().collect();
    if let [(content_type, media)] = entries.as_slice() {
        let schema = media.get("schema").unwrap_or(&Value::Null);
        let properties = schema.get("properties").and_then(|p| p.as_object());
        if let (true, Some(properties)) = (is_json_media(content_type), properties) {
            let required: Vec<&str> = schema
                .get("required")
                .and_then(|r| r.as_array())
                .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            for (name, property) in properties {
                if params.contains_key(name) {
                    tracing::warn!(%name, "body property shadows a parameter; skipping");
                    continue;
                }
                params.insert(
                    name.clone(),
                    json!({
                        "in": "body",
                        "required": body_required && required.contains(&name.as_str()),
                        "schema": property,
                    }),
                );
            }
            return;
        }
    }

    if params.contains_key(PAYLOAD_PARAMETER) {
        tracing::warn!("request body name is taken by a parameter; body not exposed");
        return;
    }

    let variants: Map<String, Value> = content
        .iter()
        .map(|(content_type, media)| {
            let schema = media
                .get("schema")
                .cloned()
                .unwrap_or_else(|| json!({"type": "string"}));
            (content_type.clone(), json!({ "schema": schema }))
        })
        .collect();

    let mut payload = Map::new();
    payload.insert("in".into(), json!("payload"));
    payload.insert("required".into(), json!(body_required));
    if let Some(description) = request_body.get("description").and_then(|v| v.as_str()) {
        payload.insert("description".into(), json!(description));
    }
    payload.insert("content".into(), Value::Object(variants));
    params.insert(PAYLOAD_PARAMETER.to_string(), Value::Object(payload));

    if content.len() > 1 && !params.contains_key(CONTENT_TYPE_PARAMETER) {
        let types: Vec<&String> = content.keys().collect();
        let default = types
            .iter()
            .find(|t| is_json_media(t))
            .or_else(|| types.first())
            .map(|t| t.to_string());
        params.insert(
            CONTENT_TYPE_PARAMETER.to_string(),
            json!({
                "in": "content_type",
                "required": false,
                "description": format!("Content type of --{PAYLOAD_PARAMETER}"),
                "schema": { "type": "string", "enum": types, "default": default },
            }),
        );
    }
}

/// Schema of the first 2xx response that has content, JSON preferred.
fn extract_response(operation: &Value) -> Option<Value> {
    let responses = operation.get("responses")?.as_object()?;
    let mut codes: Vec<&String> = responses.keys().filter(|code| code.starts_with('2')).collect();
    codes.sort();

    codes.into_iter().find_map(|code| {
        let content = responses[code].get("content")?.as_object()?;
        let media = content
            .iter()
            .find(|(content_type, _)| is_json_media(content_type))
            .or_else(|| content.iter().next())
            .map(|(_, media)| media)?;
        media.get("schema").cloned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParameterLocation, ParameterValue};

    fn document() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": { "title": "Users", "description": "Manage users" },
            "servers": [{ "url": "https://api.example.test" }],
            "paths": {
                "/users/{userId}/keys/{keyId}": {
                    "parameters": [
                        { "name": "keyId", "in": "path", "required": true, "schema": { "type": "string" } },
                        { "name": "verbose", "in": "query", "schema": { "type": "integer" } }
                    ],
                    "get": {
                        "operationId": "get_key",
                        "summary": "Fetch a key",
                        "parameters": [
                            { "name": "userId", "in": "path", "required": true, "description": "Owner", "schema": { "type": "string" } },
                            { "name": "verbose", "in": "query", "schema": { "type": "boolean" } },
                            { "name": "X-Trace", "in": "header", "schema": { "type": "string" } },
                            { "name": "session", "in": "cookie", "schema": { "type": "string" } }
                        ],
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": { "schema": { "$ref": "#/components/schemas/Key" } }
                                }
                            }
                        }
                    }
                },
                "/users": {
                    "servers": [{ "url": "https://users.example.test", "x-residency": "us" }],
                    "post": {
                        "operationId": "create_user",
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "required": ["name"],
                                        "properties": {
                                            "name": { "type": "string" },
                                            "limit": { "type": "integer" }
                                        }
                                    }
                                }
                            }
                        },
                        "responses": { "204": { "description": "created" } }
                    },
                    "put": {
                        "operationId": "import_users",
                        "requestBody": {
                            "content": {
                                "text/csv": { "schema": { "type": "string" } },
                                "application/json": { "schema": { "type": "array", "items": { "type": "object" } } }
                            }
                        }
                    },
                    "delete": { "summary": "no id" }
                }
            },
            "components": {
                "schemas": {
                    "Key": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "parent": { "$ref": "#/components/schemas/Key" }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn operations_are_extracted_in_document_order() {
        let service = describe_document("users", &document());
        assert_eq!(service.description, "Manage users");
        assert_eq!(
            service.operations.keys().collect::<Vec<_>>(),
            vec!["get_key", "create_user", "import_users"]
        );
    }

    #[test]
    fn parameters_are_merged_and_ordered() {
        let service = describe_document("users", &document());
        let op = OperationSchema::from_spec("get_key", &service.operations["get_key"]).unwrap();

        assert_eq!(
            op.parameters.keys().collect::<Vec<_>>(),
            vec!["userId", "keyId", "X-Trace", "verbose"]
        );
        // operation level wins over path level
        assert!(op.parameter("verbose").unwrap().is_toggle());
        assert_eq!(op.parameter("userId").unwrap().description(), Some("Owner"));
        assert_eq!(op.parameter("keyId").unwrap().location, ParameterLocation::Path);
        assert_eq!(op.description, "Fetch a key");
    }

    #[test]
    fn shared_name_keeps_first_declared_location() {
        let header = json!({ "name": "trace", "in": "header", "description": "Header" });
        let query = json!({ "name": "trace", "in": "query", "description": "Query" });
        let location = |params: IndexMap<String, Value>| params["trace"]["in"].clone();

        for _ in 0..8 {
            let params = collect_params("/x", None, Some(&json!([header, query])));
            assert_eq!(params.len(), 1);
            assert_eq!(location(params), "header");

            let params = collect_params("/x", Some(&json!([query])), Some(&json!([header])));
            assert_eq!(location(params), "query");
        }
    }

    #[test]
    fn refs_are_inlined_and_cycles_cut() {
        let service = describe_document("users", &document());
        let op = OperationSchema::from_spec("get_key", &service.operations["get_key"]).unwrap();
        let response = op.response.unwrap();
        assert_eq!(response.type_name(), "object");
        let parent = &service.operations["get_key"]["response"]["properties"]["parent"];
        assert_eq!(parent["type"], "object");
        assert!(parent.get("$ref").is_none());
        assert!(parent["description"]
            .as_str()
            .unwrap()
            .starts_with("Recursive reference"));
    }

    #[test]
    fn json_object_body_is_flattened() {
        let service = describe_document("users", &document());
        let op = OperationSchema::from_spec("create_user", &service.operations["create_user"]).unwrap();

        let name = op.parameter("name").unwrap();
        assert_eq!(name.location, ParameterLocation::Body);
        assert!(name.required);
        assert!(!op.parameter("limit").unwrap().required);
        assert!(op.response.is_none());

        let route = op.route.unwrap();
        assert_eq!(route.method, "POST");
        assert_eq!(route.servers[0].url, "https://users.example.test");
        assert_eq!(route.servers[0].residency.as_deref(), Some("us"));
    }

    #[test]
    fn multi_type_body_becomes_payload_with_selector() {
        let service = describe_document("users", &document());
        let op = OperationSchema::from_spec("import_users", &service.operations["import_users"]).unwrap();

        let payload = op.parameter(PAYLOAD_PARAMETER).unwrap();
        assert_eq!(payload.location, ParameterLocation::Payload);
        let ParameterValue::Content(variants) = &payload.value else {
            panic!("expected content variants");
        };
        assert_eq!(variants.keys().collect::<Vec<_>>(), vec!["application/json", "text/csv"]);

        let selector = op.parameter(CONTENT_TYPE_PARAMETER).unwrap();
        let schema = selector.schema().unwrap();
        assert_eq!(schema.default, Some(json!("application/json")));
        assert_eq!(schema.enum_values.len(), 2);
    }

    #[test]
    fn services_are_listed_from_file_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("users.json"), document().to_string()).unwrap();
        fs::write(dir.path().join("billing.yaml"), "openapi: 3.0.0\ninfo:\n  title: Billing\npaths: {}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let sdk = OpenApiSdk::new(dir.path(), Config::default()).unwrap();
        assert_eq!(sdk.list_services().unwrap(), vec!["billing", "users"]);

        let billing = sdk.describe_service("billing").unwrap();
        assert_eq!(billing.description, "Billing");
        assert!(billing.operations.is_empty());

        let err = sdk.describe_service("ghost").unwrap_err();
        assert!(matches!(err, SdkError::UnknownService { ref name } if name == "ghost"));
    }

    #[test]
    fn malformed_document_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ nope").unwrap();

        let sdk = OpenApiSdk::new(dir.path(), Config::default()).unwrap();
        let err = sdk.describe_service("broken").unwrap_err();
        assert!(matches!(err, SdkError::DocumentParse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
