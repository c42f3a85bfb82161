//! Display types for parameter schemas.
//!
//! The display type is what help text prints next to a flag. Rules, in
//! order: objects and arrays are `list`; a `format` wins over the primitive
//! type; `oneOf`/`anyOf` nodes show the sorted, de-duplicated union of their
//! alternatives joined with `" | "`. Anything else is an error.

use std::collections::BTreeSet;

use crate::error::SchemaError;
use crate::schema::{CompoundKind, OperationParameter, ParameterSchema, ParameterValue, Shape};

/// Resolve the display type of a schema node.
pub fn resolve_display_type(schema: &ParameterSchema) -> Result<String, SchemaError> {
    let mut members = BTreeSet::new();
    collect_members(schema, &mut members)?;
    Ok(join(members))
}

/// Display type of a whole parameter; content-typed parameters show the
/// union over their content variants.
pub fn parameter_display_type(param: &OperationParameter) -> Result<String, SchemaError> {
    match &param.value {
        ParameterValue::Schema(schema) => resolve_display_type(schema),
        ParameterValue::Content(variants) => {
            let mut members = BTreeSet::new();
            for schema in variants.values() {
                collect_members(schema, &mut members)?;
            }
            Ok(join(members))
        }
    }
}

fn join(members: BTreeSet<String>) -> String {
    members.into_iter().collect::<Vec<_>>().join(" | ")
}

fn collect_members(
    schema: &ParameterSchema,
    members: &mut BTreeSet<String>,
) -> Result<(), SchemaError> {
    match &schema.shape {
        Shape::Object { .. } | Shape::Array { .. } => {
            members.insert("list".to_string());
        }
        Shape::Primitive(kind) => {
            let name = schema.format.as_deref().unwrap_or(kind.as_str());
            members.insert(name.to_string());
        }
        Shape::Compound { .. } if schema.format.is_some() => {
            members.extend(schema.format.clone());
        }
        Shape::Compound {
            kind: CompoundKind::OneOf | CompoundKind::AnyOf,
            alternatives,
        } => {
            for alternative in alternatives {
                collect_members(alternative, members)?;
            }
        }
        Shape::Compound {
            kind: CompoundKind::AllOf,
            ..
        } => {
            return Err(SchemaError::Unsupported {
                schema: schema.raw().clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn display(value: Value) -> String {
        resolve_display_type(&ParameterSchema::from_value(&value).unwrap()).unwrap()
    }

    #[test]
    fn objects_and_arrays_are_lists() {
        assert_eq!(display(json!({"type": "object"})), "list");
        assert_eq!(display(json!({"type": "array", "items": {"type": "string"}})), "list");
        assert_eq!(display(json!({"type": "object", "format": "custom"})), "list");
    }

    #[test]
    fn format_wins_over_primitive_type() {
        assert_eq!(display(json!({"type": "string", "format": "uuid"})), "uuid");
        assert_eq!(display(json!({"type": "integer", "format": "int64"})), "int64");
        assert_eq!(display(json!({"format": "date-time"})), "date-time");
    }

    #[test]
    fn primitive_type_is_its_own_display_type() {
        assert_eq!(display(json!({"type": "boolean"})), "boolean");
        assert_eq!(display(json!({"type": "number"})), "number");
    }

    #[test]
    fn compound_union_is_sorted_and_deduplicated() {
        let schema = json!({
            "oneOf": [
                {"type": "string"},
                {"type": "integer"},
                {"type": "string"}
            ]
        });
        for _ in 0..5 {
            assert_eq!(display(schema.clone()), "integer | string");
        }

        assert_eq!(
            display(json!({"anyOf": [{"type": "object"}, {"type": "string", "format": "uuid"}]})),
            "list | uuid"
        );
    }

    #[test]
    fn nested_compounds_flatten_into_one_union() {
        let schema = json!({
            "anyOf": [
                {"oneOf": [{"type": "string"}, {"type": "integer"}]},
                {"type": "string"}
            ]
        });
        assert_eq!(display(schema), "integer | string");
    }

    #[test]
    fn unmerged_all_of_is_unsupported() {
        let raw = json!({"allOf": [{"type": "string"}, {"type": "object"}]});
        let schema = ParameterSchema::from_value(&raw).unwrap();
        let err = resolve_display_type(&schema).unwrap_err();
        match err {
            SchemaError::Unsupported { schema } => assert_eq!(schema, raw),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn content_parameter_unions_its_variants() {
        let param = OperationParameter::from_spec(
            "body",
            &json!({
                "in": "payload",
                "content": {
                    "application/json": {"type": "object"},
                    "text/plain": {"type": "string"}
                }
            }),
        )
        .unwrap();
        assert_eq!(parameter_display_type(&param).unwrap(), "list | string");
    }
}
