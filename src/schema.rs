//! Operation and parameter schema model.
//!
//! The SDK hands over operation documents as raw JSON. They are compiled once
//! into [`OperationSchema`], whose parameter nodes are classified into a
//! closed set of [`Shape`]s; the resolver, encoder, parser builder and help
//! renderer all match on that enum instead of probing keys.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Scalar JSON schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Integer,
    Number,
    Boolean,
}

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// The keyword a compound schema was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundKind {
    OneOf,
    AnyOf,
    AllOf,
}

impl CompoundKind {
    const ALL: [CompoundKind; 3] = [Self::OneOf, Self::AnyOf, Self::AllOf];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::OneOf => "oneOf",
            Self::AnyOf => "anyOf",
            Self::AllOf => "allOf",
        }
    }
}

/// Exactly one structural classification per schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Primitive(PrimitiveType),
    Object {
        properties: BTreeMap<String, ParameterSchema>,
        required: Vec<String>,
    },
    Array {
        items: Option<Box<ParameterSchema>>,
    },
    Compound {
        kind: CompoundKind,
        alternatives: Vec<ParameterSchema>,
    },
}

/// A compiled schema node plus the documentation attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchema {
    pub shape: Shape,
    pub title: Option<String>,
    pub description: Option<String>,
    pub format: Option<String>,
    pub enum_values: Vec<Value>,
    pub default: Option<Value>,
    /// `x-name`: label used when documenting list-shaped responses.
    pub list_name: Option<String>,
    raw: Value,
}

impl ParameterSchema {
    /// Classify a raw JSON schema node.
    ///
    /// Fails when the node matches no shape or declares two incompatible
    /// ones; the error carries the offending fragment.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let node = value.as_object().ok_or_else(|| unsupported(value))?;
        let shape = classify(node, value)?;

        Ok(Self {
            shape,
            title: string_field(node, "title"),
            description: string_field(node, "description"),
            format: string_field(node, "format"),
            enum_values: node
                .get("enum")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
            default: node.get("default").cloned(),
            list_name: string_field(node, "x-name"),
            raw: value.clone(),
        })
    }

    /// The JSON this node was compiled from.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        match self.shape {
            Shape::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive_type().is_some()
    }

    /// Name of the node's classification (`object`, `array`, a primitive
    /// type name, or the compound keyword).
    pub fn type_name(&self) -> &'static str {
        match &self.shape {
            Shape::Primitive(kind) => kind.as_str(),
            Shape::Object { .. } => "object",
            Shape::Array { .. } => "array",
            Shape::Compound { kind, .. } => kind.keyword(),
        }
    }
}

fn unsupported(value: &Value) -> SchemaError {
    SchemaError::Unsupported {
        schema: value.clone(),
    }
}

fn conflicting(first: &'static str, second: &'static str, value: &Value) -> SchemaError {
    SchemaError::Conflicting {
        first,
        second,
        schema: value.clone(),
    }
}

fn string_field(node: &Map<String, Value>, key: &str) -> Option<String> {
    node.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn classify(node: &Map<String, Value>, value: &Value) -> Result<Shape, SchemaError> {
    let declared = declared_type(node, value)?;
    let compound = compound_members(node, value)?;
    let has_properties = node.contains_key("properties");
    let has_items = node.contains_key("items");

    if has_properties && has_items {
        return Err(conflicting("properties", "items", value));
    }

    if let Some((kind, members)) = compound {
        if declared.is_some() {
            return Err(conflicting("type", kind.keyword(), value));
        }
        if has_properties {
            return Err(conflicting("properties", kind.keyword(), value));
        }
        if has_items {
            return Err(conflicting("items", kind.keyword(), value));
        }
        return compound_shape(kind, members);
    }

    match declared {
        Some("object") => {
            if has_items {
                return Err(conflicting("type: object", "items", value));
            }
            object_shape(node)
        }
        Some("array") => {
            if has_properties {
                return Err(conflicting("type: array", "properties", value));
            }
            array_shape(node)
        }
        Some(name) => {
            if has_properties {
                return Err(conflicting("primitive type", "properties", value));
            }
            if has_items {
                return Err(conflicting("primitive type", "items", value));
            }
            PrimitiveType::from_name(name)
                .map(Shape::Primitive)
                .ok_or_else(|| SchemaError::UnknownType {
                    type_name: name.to_string(),
                    schema: value.clone(),
                })
        }
        None if has_properties => object_shape(node),
        None if has_items => array_shape(node),
        None if node.contains_key("format") => Ok(Shape::Primitive(PrimitiveType::String)),
        None => Err(unsupported(value)),
    }
}

/// `type` as a string, or the first non-null member of a type list.
fn declared_type<'a>(
    node: &'a Map<String, Value>,
    value: &Value,
) -> Result<Option<&'a str>, SchemaError> {
    match node.get("type") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) => Ok(Some(name.as_str())),
        Some(Value::Array(names)) => Ok(names
            .iter()
            .filter_map(|v| v.as_str())
            .find(|name| *name != "null")),
        Some(_) => Err(unsupported(value)),
    }
}

fn compound_members<'a>(
    node: &'a Map<String, Value>,
    value: &Value,
) -> Result<Option<(CompoundKind, &'a Vec<Value>)>, SchemaError> {
    let mut found: Option<(CompoundKind, &'a Vec<Value>)> = None;

    for kind in CompoundKind::ALL {
        let Some(members) = node.get(kind.keyword()) else {
            continue;
        };
        if let Some((previous, _)) = found {
            return Err(conflicting(previous.keyword(), kind.keyword(), value));
        }
        match members.as_array() {
            Some(list) if !list.is_empty() => found = Some((kind, list)),
            _ => return Err(unsupported(value)),
        }
    }

    Ok(found)
}

fn compound_shape(kind: CompoundKind, members: &[Value]) -> Result<Shape, SchemaError> {
    let alternatives = members
        .iter()
        .map(ParameterSchema::from_value)
        .collect::<Result<Vec<_>, _>>()?;

    // allOf over plain objects is just one bigger object.
    if kind == CompoundKind::AllOf
        && alternatives
            .iter()
            .all(|alt| matches!(alt.shape, Shape::Object { .. }))
    {
        let mut properties = BTreeMap::new();
        let mut required: Vec<String> = Vec::new();
        for alt in alternatives {
            if let Shape::Object {
                properties: props,
                required: req,
            } = alt.shape
            {
                properties.extend(props);
                for name in req {
                    if !required.contains(&name) {
                        required.push(name);
                    }
                }
            }
        }
        return Ok(Shape::Object {
            properties,
            required,
        });
    }

    Ok(Shape::Compound { kind, alternatives })
}

fn object_shape(node: &Map<String, Value>) -> Result<Shape, SchemaError> {
    let mut properties = BTreeMap::new();
    if let Some(props) = node.get("properties").and_then(|p| p.as_object()) {
        for (name, prop) in props {
            properties.insert(name.clone(), ParameterSchema::from_value(prop)?);
        }
    }

    // At parameter level `required` is a bool; only a list names properties.
    let required = node
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Shape::Object {
        properties,
        required,
    })
}

fn array_shape(node: &Map<String, Value>) -> Result<Shape, SchemaError> {
    let items = match node.get("items") {
        Some(items) => Some(Box::new(ParameterSchema::from_value(items)?)),
        None => None,
    };
    Ok(Shape::Array { items })
}

/// Where a parameter travels when the operation is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    /// One property of a JSON object request body.
    Body,
    /// The whole request body.
    Payload,
    /// Selects the content type of the payload.
    ContentType,
}

impl ParameterLocation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "body" => Some(Self::Body),
            "payload" => Some(Self::Payload),
            "content_type" => Some(Self::ContentType),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Body => "body",
            Self::Payload => "payload",
            Self::ContentType => "content_type",
        }
    }
}

/// A parameter is either a single schema or one schema per content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Schema(ParameterSchema),
    Content(BTreeMap<String, ParameterSchema>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationParameter {
    pub name: String,
    pub required: bool,
    pub location: ParameterLocation,
    pub description: Option<String>,
    pub value: ParameterValue,
}

impl OperationParameter {
    /// Compile one entry of an operation's `parameters` map.
    ///
    /// The entry is either a schema carrying `required`/`in` alongside its
    /// own keys, an OpenAPI-style wrapper with a nested `schema`, or a
    /// `content` map of content type to schema.
    pub fn from_spec(name: &str, spec: &Value) -> Result<Self, SchemaError> {
        let node = spec.as_object().ok_or_else(|| unsupported(spec))?;

        let required = node
            .get("required")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let location = node
            .get("in")
            .and_then(|v| v.as_str())
            .and_then(ParameterLocation::from_name)
            .unwrap_or(ParameterLocation::Query);

        let value = if let Some(content) = node.get("content").and_then(|c| c.as_object()) {
            let mut variants = BTreeMap::new();
            for (content_type, variant) in content {
                let schema = variant.get("schema").unwrap_or(variant);
                variants.insert(content_type.clone(), ParameterSchema::from_value(schema)?);
            }
            ParameterValue::Content(variants)
        } else if let Some(schema) = node.get("schema") {
            ParameterValue::Schema(ParameterSchema::from_value(schema)?)
        } else {
            ParameterValue::Schema(ParameterSchema::from_value(spec)?)
        };

        Ok(Self {
            name: name.to_string(),
            required,
            location,
            description: string_field(node, "description"),
            value,
        })
    }

    pub fn schema(&self) -> Option<&ParameterSchema> {
        match &self.value {
            ParameterValue::Schema(schema) => Some(schema),
            ParameterValue::Content(_) => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or_else(|| self.schema().and_then(|s| s.description.as_deref()))
    }

    pub fn is_toggle(&self) -> bool {
        self.schema()
            .is_some_and(|s| s.primitive_type() == Some(PrimitiveType::Boolean))
    }
}

/// A base URL the operation can be sent to, optionally tagged with the
/// endpoint/residency selectors it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub url: String,
    pub endpoint: Option<String>,
    pub residency: Option<String>,
}

/// HTTP binding of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: String,
    pub path: String,
    pub servers: Vec<Server>,
}

/// A compiled operation: its parameters in declaration order and the shape
/// of its response.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSchema {
    /// The name the operation is selected by on the command line.
    pub name: String,
    pub operation_id: String,
    pub description: String,
    pub parameters: IndexMap<String, OperationParameter>,
    /// `None` when the operation produces no output.
    pub response: Option<ParameterSchema>,
    pub route: Option<Route>,
}

impl OperationSchema {
    pub fn from_spec(name: &str, spec: &Value) -> Result<Self, SchemaError> {
        let node = spec.as_object().ok_or_else(|| SchemaError::Operation {
            operation: name.to_string(),
            reason: "operation document is not an object".to_string(),
        })?;

        let operation_id = string_field(node, "operationId").unwrap_or_else(|| name.to_string());
        let description = string_field(node, "description").unwrap_or_default();

        let mut parameters = IndexMap::new();
        if let Some(params) = node.get("parameters").and_then(|p| p.as_object()) {
            for (param_name, param_spec) in params {
                let param = OperationParameter::from_spec(param_name, param_spec).map_err(
                    |source| SchemaError::Parameter {
                        operation: name.to_string(),
                        parameter: param_name.clone(),
                        source: Box::new(source),
                    },
                )?;
                parameters.insert(param_name.clone(), param);
            }
        }

        let response = match node.get("response") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(value) => Some(ParameterSchema::from_value(value).map_err(|source| {
                SchemaError::Response {
                    operation: name.to_string(),
                    source: Box::new(source),
                }
            })?),
        };

        Ok(Self {
            name: name.to_string(),
            operation_id,
            description,
            parameters,
            response,
            route: route(node),
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&OperationParameter> {
        self.parameters.get(name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &OperationParameter> {
        self.parameters.values().filter(|p| p.required)
    }

    pub fn optional_parameters(&self) -> impl Iterator<Item = &OperationParameter> {
        self.parameters.values().filter(|p| !p.required)
    }
}

fn route(node: &Map<String, Value>) -> Option<Route> {
    let method = string_field(node, "method")?;
    let path = string_field(node, "path")?;
    let servers = node
        .get("servers")
        .and_then(|s| s.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|server| {
                    let server = server.as_object()?;
                    Some(Server {
                        url: string_field(server, "url")?,
                        endpoint: string_field(server, "x-endpoint"),
                        residency: string_field(server, "x-residency"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Route {
        method: method.to_uppercase(),
        path,
        servers,
    })
}
