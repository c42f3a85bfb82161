//! `svccli <service> <operation> help`
//!
//! Parameters and the response share one recursive renderer. Request
//! objects additionally get a "JSON Syntax" skeleton; responses start from
//! a structure or list heading instead.

use serde_json::{Map, Value};

use crate::builder::PROGRAM;
use crate::error::SchemaError;
use crate::resolver::{parameter_display_type, resolve_display_type};
use crate::schema::{
    CompoundKind, OperationParameter, OperationSchema, ParameterSchema, ParameterValue, Shape,
};

use super::{description, footer, header, section, wrap_text, HelpPage, Lines, Style};

const NO_OUTPUT: &str = "\tThis command doesn't produce an output";
const INDENT: &str = "\t  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Request,
    Response,
}

pub struct OperationHelp<'a> {
    pub operation: &'a OperationSchema,
    pub style: Style,
}

impl<'a> OperationHelp<'a> {
    pub fn new(operation: &'a OperationSchema, style: Style) -> Self {
        Self { operation, style }
    }

    fn ordered_parameters(&self) -> impl Iterator<Item = &'a OperationParameter> {
        self.operation
            .required_parameters()
            .chain(self.operation.optional_parameters())
    }

    fn description(&self) -> Vec<String> {
        let mut lines = description(&self.operation.description, &self.style);
        lines.push(format!(
            "\tSee '{PROGRAM} help' for descriptions of global parameters."
        ));
        lines.push(String::new());
        lines
    }

    fn synopsis(&self) -> Vec<String> {
        let mut lines = vec![
            self.style.bold("SYNOPSIS"),
            format!("\t  {}", self.operation.name),
        ];
        for param in self.operation.required_parameters() {
            lines.push(format!("\t--{} <value>", param.name));
        }
        for param in self.operation.optional_parameters() {
            lines.push(format!("\t[--{} <value>]", param.name));
        }
        lines.push(String::new());
        lines
    }

    fn options(&self) -> Result<Vec<String>, SchemaError> {
        let mut renderer = Renderer::new(self.style);
        renderer.push(self.style.bold("OPTIONS"));
        for param in self.ordered_parameters() {
            let display = parameter_display_type(param).map_err(|source| self.wrap(param, source))?;
            renderer.push(format!(
                "{}({display})",
                self.style.bold(&format!("\t--{} ", param.name))
            ));
            renderer
                .parameter(param)
                .map_err(|source| self.wrap(param, source))?;
            renderer.push(String::new());
        }
        Ok(renderer.lines)
    }

    fn wrap(&self, param: &OperationParameter, source: SchemaError) -> SchemaError {
        SchemaError::Parameter {
            operation: self.operation.name.clone(),
            parameter: param.name.clone(),
            source: Box::new(source),
        }
    }

    fn output(&self) -> Result<Vec<String>, SchemaError> {
        let mut renderer = Renderer::new(self.style);
        renderer.push(self.style.bold("OUTPUT"));
        let Some(response) = &self.operation.response else {
            renderer.push(NO_OUTPUT.to_string());
            return Ok(renderer.lines);
        };

        renderer
            .response(response)
            .map_err(|source| SchemaError::Response {
                operation: self.operation.name.clone(),
                source: Box::new(source),
            })?;
        Ok(renderer.lines)
    }
}

impl HelpPage for OperationHelp<'_> {
    fn lines(&self) -> Lines<'_> {
        let name = &self.operation.name;
        Box::new(
            section(move || Ok(header(name, &self.style)))
                .chain(section(move || Ok(self.description())))
                .chain(section(move || Ok(self.synopsis())))
                .chain(section(move || self.options()))
                .chain(section(move || self.output()))
                .chain(section(move || Ok(footer(name)))),
        )
    }
}

struct Renderer {
    style: Style,
    lines: Vec<String>,
}

impl Renderer {
    fn new(style: Style) -> Self {
        Self {
            style,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    fn wrapped(&mut self, text: &str, initial: &str, subsequent: &str) {
        self.lines.extend(wrap_text(text, initial, subsequent));
    }

    fn parameter(&mut self, param: &OperationParameter) -> Result<(), SchemaError> {
        match &param.value {
            ParameterValue::Schema(schema) => {
                self.node(schema, param.description(), Side::Request, INDENT, true)
            }
            ParameterValue::Content(variants) if variants.len() == 1 => {
                let Some(schema) = variants.values().next() else {
                    return Ok(());
                };
                let text = param.description.as_deref().or(schema.description.as_deref());
                self.node(schema, text, Side::Request, INDENT, true)
            }
            ParameterValue::Content(variants) => {
                if let Some(text) = param.description.as_deref() {
                    self.wrapped(text, INDENT, INDENT);
                    self.push(String::new());
                }
                self.push(format!(
                    "{INDENT}This argument depends on the 'content_type' argument value"
                ));
                let nested = format!("{INDENT}  ");
                for (content_type, schema) in variants {
                    self.push(String::new());
                    self.push(format!("{INDENT}--content_type={content_type}:"));
                    self.node(
                        schema,
                        schema.description.as_deref(),
                        Side::Request,
                        &nested,
                        true,
                    )?;
                }
                Ok(())
            }
        }
    }

    fn response(&mut self, schema: &ParameterSchema) -> Result<(), SchemaError> {
        match &schema.shape {
            Shape::Object { properties, .. } => {
                self.push(format!(
                    "\t{} -> (structure)",
                    schema.title.as_deref().unwrap_or_default()
                ));
                if let Some(text) = &schema.description {
                    self.wrapped(text, INDENT, INDENT);
                }
                self.push(String::new());
                let nested = format!("{INDENT}  ");
                for (name, property) in properties {
                    self.push(format!(
                        "{INDENT}{name} -> ({})",
                        resolve_display_type(property)?
                    ));
                    self.node(
                        property,
                        property.description.as_deref(),
                        Side::Response,
                        &nested,
                        true,
                    )?;
                    self.push(String::new());
                }
                Ok(())
            }
            Shape::Array { .. } => {
                self.push(format!(
                    "{INDENT}{} -> (list)",
                    schema.list_name.as_deref().unwrap_or_default()
                ));
                self.node(
                    schema,
                    schema.description.as_deref(),
                    Side::Response,
                    INDENT,
                    true,
                )
            }
            _ => self.node(
                schema,
                schema.description.as_deref(),
                Side::Response,
                INDENT,
                true,
            ),
        }
    }

    /// Document one schema node and everything nested under it.
    fn node(
        &mut self,
        schema: &ParameterSchema,
        text: Option<&str>,
        side: Side,
        indent: &str,
        declare: bool,
    ) -> Result<(), SchemaError> {
        if declare {
            if let Some(text) = text {
                self.wrapped(text, indent, indent);
                self.push(String::new());
            }
        }

        let nested = format!("{indent}  ");
        match &schema.shape {
            Shape::Primitive(_) => {}
            Shape::Array { items: None } => {}
            Shape::Array { items: Some(items) } => {
                self.node(items, items.description.as_deref(), side, indent, declare)?;
            }
            Shape::Object { properties, .. } => {
                if declare && side == Side::Request {
                    self.json_syntax(schema, indent)?;
                }
                for (name, property) in properties {
                    self.push(String::new());
                    let line = format!(
                        "o {} - {}",
                        self.style.bold(name),
                        property.description.as_deref().unwrap_or_default()
                    );
                    self.wrapped(&line, indent, &nested);
                    self.node(property, None, side, &nested, false)?;
                }
            }
            Shape::Compound { kind, alternatives } => {
                let quantifier = match kind {
                    CompoundKind::OneOf => "one of",
                    CompoundKind::AnyOf => "any of",
                    CompoundKind::AllOf => "all of",
                };
                self.push(String::new());
                self.push(format!(
                    "{indent}This argument must be {quantifier} the following:"
                ));
                for alternative in alternatives {
                    self.push(String::new());
                    let line = format!(
                        "{} ({}) - {}",
                        self.style
                            .bold(alternative.title.as_deref().unwrap_or_default()),
                        resolve_display_type(alternative)?,
                        alternative.description.as_deref().unwrap_or_default()
                    );
                    self.wrapped(&line, &nested, &nested);
                    self.node(alternative, None, side, &nested, declare)?;
                }
            }
        }

        if !schema.enum_values.is_empty() {
            let values: Vec<String> = schema.enum_values.iter().map(literal).collect();
            self.push(String::new());
            self.push(format!("{indent}Valid values: {}", values.join(", ")));
        }
        if let Some(default) = &schema.default {
            self.push(String::new());
            self.push(format!("{indent}Default: {}", literal(default)));
        }
        Ok(())
    }

    fn json_syntax(&mut self, schema: &ParameterSchema, indent: &str) -> Result<(), SchemaError> {
        let skeleton = format!("{:#}", skeleton(schema)?).replace('"', "");
        let json_indent = format!("{indent}  ");
        self.push(String::new());
        self.push(format!("{indent}JSON Syntax:"));
        self.push(String::new());
        for row in skeleton.lines() {
            self.push(format!("{json_indent}{row}"));
        }
        self.push(String::new());
        Ok(())
    }
}

/// Strings print bare, everything else as JSON.
fn literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The shape of a value, with every leaf replaced by its type.
fn skeleton(schema: &ParameterSchema) -> Result<Value, SchemaError> {
    Ok(match &schema.shape {
        Shape::Object { properties, .. } => {
            let mut object = Map::new();
            for (name, property) in properties {
                object.insert(name.clone(), skeleton(property)?);
            }
            Value::Object(object)
        }
        Shape::Array { items } => match items {
            Some(items) => Value::Array(vec![skeleton(items)?]),
            None => Value::Array(Vec::new()),
        },
        Shape::Primitive(_) if !schema.enum_values.is_empty() => {
            let values: Vec<String> = schema.enum_values.iter().map(literal).collect();
            Value::String(values.join(" | "))
        }
        _ => Value::String(resolve_display_type(schema)?),
    })
}
