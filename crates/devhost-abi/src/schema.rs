//! A small, permissive subset of JSON Schema used to reject obviously
//! malformed `connect` parameters before they ever cross the pipe.
//!
//! Supported keywords: `type` (scalar or array of scalars), `required`,
//! `enum`, and nested `properties`. Anything else in the schema is
//! ignored rather than rejected — an unknown keyword is not grounds to
//! fail local validation, since a richer plugin-side validator gets the
//! final say.

use serde_json::Value;

/// Validates an `instance` against a `schema` using the subset described
/// above.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaLiteValidator;

impl SchemaLiteValidator {
    /// Create a validator. Stateless; provided as a type for symmetry
    /// with the rest of the component catalog and to leave room for a
    /// future cache of compiled schemas.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate `instance` against `schema`. Returns `Ok(())` when valid,
    /// or `Err(reason)` describing the first violation found.
    pub fn validate(&self, schema: &Value, instance: &Value) -> Result<(), String> {
        self.validate_node(schema, instance, "$")
    }

    fn validate_node(&self, schema: &Value, instance: &Value, path: &str) -> Result<(), String> {
        let Some(schema_obj) = schema.as_object() else {
            return Ok(());
        };

        if let Some(type_spec) = schema_obj.get("type") {
            Self::check_type(type_spec, instance, path)?;
        }

        if let Some(enum_values) = schema_obj.get("enum").and_then(Value::as_array) {
            if !enum_values.iter().any(|v| v == instance) {
                return Err(format!("{path}: value is not one of the allowed enum values"));
            }
        }

        if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
            let Some(instance_obj) = instance.as_object() else {
                return Err(format!("{path}: expected an object to check required properties"));
            };
            for key in required {
                let Some(key) = key.as_str() else { continue };
                if !instance_obj.contains_key(key) {
                    return Err(format!("{path}: missing required property '{key}'"));
                }
            }
        }

        if let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) {
            if let Some(instance_obj) = instance.as_object() {
                for (key, sub_schema) in properties {
                    if let Some(sub_instance) = instance_obj.get(key) {
                        self.validate_node(sub_schema, sub_instance, &format!("{path}.{key}"))?;
                    }
                }
            }
        }

        Ok(())
    }

    fn check_type(type_spec: &Value, instance: &Value, path: &str) -> Result<(), String> {
        let candidates: Vec<&str> = match type_spec {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => return Ok(()),
        };

        if candidates.is_empty() {
            return Ok(());
        }

        let matches = candidates.iter().any(|candidate| Self::instance_is_type(instance, candidate));
        if matches {
            Ok(())
        } else {
            Err(format!(
                "{path}: expected type {}, got {}",
                candidates.join(" | "),
                Self::type_name(instance)
            ))
        }
    }

    fn instance_is_type(instance: &Value, type_name: &str) -> bool {
        match type_name {
            "string" => instance.is_string(),
            "number" => instance.is_number(),
            "integer" => instance.is_i64() || instance.is_u64(),
            "boolean" => instance.is_boolean(),
            "object" => instance.is_object(),
            "array" => instance.is_array(),
            "null" => instance.is_null(),
            _ => true,
        }
    }

    fn type_name(instance: &Value) -> &'static str {
        match instance {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_matching_required_and_types() {
        let schema = json!({
            "type": "object",
            "required": ["port", "baud_rate"],
            "properties": {
                "port": {"type": "string"},
                "baud_rate": {"type": "integer"},
            }
        });
        let instance = json!({"port": "/dev/ttyUSB0", "baud_rate": 115200});
        assert!(SchemaLiteValidator::new().validate(&schema, &instance).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let schema = json!({"required": ["port"]});
        let instance = json!({});
        assert!(SchemaLiteValidator::new().validate(&schema, &instance).is_err());
    }

    #[test]
    fn rejects_wrong_type() {
        let schema = json!({"properties": {"baud_rate": {"type": "integer"}}});
        let instance = json!({"baud_rate": "fast"});
        assert!(SchemaLiteValidator::new().validate(&schema, &instance).is_err());
    }

    #[test]
    fn enforces_enum() {
        let schema = json!({"enum": ["a", "b"]});
        assert!(SchemaLiteValidator::new().validate(&schema, &json!("a")).is_ok());
        assert!(SchemaLiteValidator::new().validate(&schema, &json!("c")).is_err());
    }

    #[test]
    fn unknown_keywords_are_permissive() {
        let schema = json!({"type": "string", "minLength": 5});
        assert!(SchemaLiteValidator::new().validate(&schema, &json!("ok")).is_ok());
    }

    #[test]
    fn accepts_array_of_types() {
        let schema = json!({"type": ["string", "null"]});
        assert!(SchemaLiteValidator::new().validate(&schema, &json!(null)).is_ok());
        assert!(SchemaLiteValidator::new().validate(&schema, &json!("x")).is_ok());
        assert!(SchemaLiteValidator::new().validate(&schema, &json!(5)).is_err());
    }
}
