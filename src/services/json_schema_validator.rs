//! Hand-rolled JSON-Schema subset validator (C2).
//!
//! Deliberately not a general-purpose `jsonschema` crate: this validates
//! only the keyword subset spec'd for task params — `type`, `required`,
//! `properties`, `minLength`, `maxLength`, `minimum`, `maximum`, `pattern`,
//! `enum`, `items`, `default` — with bespoke ReDoS-capped regex handling and
//! fail-fast-per-field-but-collect-across-fields semantics that a generic
//! validator would not give us for free.

use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::errors::Violation;

/// Values longer than this are rejected before being matched against a
/// `pattern`, bounding worst-case regex evaluation time.
const MAX_PATTERN_INPUT_BYTES: usize = 10 * 1024;

/// Validate `instance` against `schema`, filling in any `default`s declared
/// for missing object properties. Returns the (possibly filled) instance on
/// success, or the full ordered list of violations on failure.
pub fn validate(schema: &Value, instance: &Value) -> Result<Value, Vec<Violation>> {
    let mut violations = Vec::new();
    let filled = validate_node(schema, instance, "", &mut violations);
    if violations.is_empty() {
        Ok(filled)
    } else {
        Err(violations)
    }
}

/// A schema document is valid for registration if it parses as a JSON
/// object carrying a top-level `type`.
#[must_use]
pub fn has_valid_shape(schema: &Value) -> bool {
    schema.as_object().is_some_and(|o| o.get("type").is_some())
}

fn validate_node(schema: &Value, instance: &Value, path: &str, violations: &mut Vec<Violation>) -> Value {
    let Some(schema_obj) = schema.as_object() else {
        return instance.clone();
    };

    if let Some(Value::String(expected)) = schema_obj.get("type") {
        if !matches_type(expected, instance) {
            violations.push(Violation::new(path, "type", format!("expected {expected}")));
            return instance.clone();
        }
    }

    if let Some(Value::Array(allowed)) = schema_obj.get("enum") {
        if !allowed.contains(instance) {
            violations.push(Violation::new(path, "enum", "value is not one of the allowed options"));
        }
    }

    match instance {
        Value::String(s) => validate_string(schema_obj, s, path, violations),
        Value::Number(n) => validate_number(schema_obj, n, path, violations),
        Value::Object(obj) => return validate_object(schema_obj, obj, path, violations),
        Value::Array(items) => return validate_array(schema_obj, items, path, violations),
        Value::Bool(_) | Value::Null => {}
    }

    instance.clone()
}

fn matches_type(expected: &str, instance: &Value) -> bool {
    match expected {
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "object" => instance.is_object(),
        // An empty array/object is ambiguous in languages without a
        // native array/object distinction; serde_json::Value already
        // discriminates them structurally, so both collapse to a plain
        // structural check here.
        "array" => instance.is_array(),
        "integer" => instance.as_f64().is_some_and(|f| f.fract() == 0.0),
        "number" => instance.is_number(),
        _ => true,
    }
}

fn validate_string(schema_obj: &Map<String, Value>, s: &str, path: &str, violations: &mut Vec<Violation>) {
    if let Some(min) = schema_obj.get("minLength").and_then(Value::as_u64) {
        if (s.chars().count() as u64) < min {
            violations.push(Violation::new(path, "minLength", format!("shorter than {min}")));
        }
    }
    if let Some(max) = schema_obj.get("maxLength").and_then(Value::as_u64) {
        if (s.chars().count() as u64) > max {
            violations.push(Violation::new(path, "maxLength", format!("longer than {max}")));
        }
    }
    if let Some(Value::String(pattern)) = schema_obj.get("pattern") {
        if s.len() > MAX_PATTERN_INPUT_BYTES {
            violations.push(Violation::new(path, "pattern", "value exceeds the pattern input size bound"));
        } else {
            match anchored(pattern) {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => violations.push(Violation::new(path, "pattern", format!("does not match {pattern}"))),
                Err(_) => violations.push(Violation::new(path, "pattern", "invalid pattern")),
            }
        }
    }
}

fn validate_number(schema_obj: &Map<String, Value>, n: &serde_json::Number, path: &str, violations: &mut Vec<Violation>) {
    let Some(value) = n.as_f64() else { return };
    if let Some(min) = schema_obj.get("minimum").and_then(Value::as_f64) {
        if value < min {
            violations.push(Violation::new(path, "minimum", format!("below {min}")));
        }
    }
    if let Some(max) = schema_obj.get("maximum").and_then(Value::as_f64) {
        if value > max {
            violations.push(Violation::new(path, "maximum", format!("above {max}")));
        }
    }
}

fn validate_object(
    schema_obj: &Map<String, Value>,
    instance: &Map<String, Value>,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Value {
    let mut filled = instance.clone();

    if let Some(Value::Array(required)) = schema_obj.get("required") {
        for name in required {
            if let Some(name) = name.as_str() {
                if !instance.contains_key(name) {
                    violations.push(Violation::new(join_path(path, name), "required", "missing required field"));
                }
            }
        }
    }

    if let Some(Value::Object(properties)) = schema_obj.get("properties") {
        for (name, prop_schema) in properties {
            let field_path = join_path(path, name);
            match instance.get(name) {
                Some(value) => {
                    let validated = validate_node(prop_schema, value, &field_path, violations);
                    filled.insert(name.clone(), validated);
                }
                None => {
                    if let Some(default) = prop_schema.get("default") {
                        filled.insert(name.clone(), default.clone());
                    }
                }
            }
        }
    }

    Value::Object(filled)
}

fn validate_array(schema_obj: &Map<String, Value>, items: &[Value], path: &str, violations: &mut Vec<Violation>) -> Value {
    let Some(item_schema) = schema_obj.get("items") else {
        return Value::Array(items.to_vec());
    };
    let filled = items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_node(item_schema, item, &format!("{path}[{i}]"), violations))
        .collect();
    Value::Array(filled)
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    if pattern.starts_with('^') && pattern.ends_with('$') {
        Regex::new(pattern)
    } else {
        Regex::new(&format!("^(?:{pattern})$"))
    }
}
