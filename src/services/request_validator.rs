//! Per-endpoint request validation (C7).
//!
//! Rules are loaded from the `api_validations` table (see
//! [`crate::domain::ports::EndpointRepository`]) and evaluated against a
//! typed [`RequestContext`] built once per request by the router — never by
//! runtime string interpolation on the request path.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::domain::errors::Violation;
use crate::domain::models::{ApiValidation, ParamSource, ParamType};

/// The typed values a validation rule or router template placeholder can
/// draw from (`{source, key}` substitution, spec §9).
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl RequestContext {
    fn raw(&self, source: ParamSource, name: &str) -> Option<String> {
        match source {
            ParamSource::Path => self.path_params.get(name).cloned(),
            ParamSource::Query => self.query_params.get(name).cloned(),
            ParamSource::Header => self.headers.get(name).cloned(),
            ParamSource::Body => self.body.get(name).map(|v| {
                if let Value::String(s) = v {
                    s.clone()
                } else {
                    v.to_string()
                }
            }),
        }
    }

    /// The body value directly, for rules that need structural checks
    /// (array/object) rather than a stringified scalar.
    fn body_value(&self, name: &str) -> Option<Value> {
        self.body.get(name).cloned()
    }
}

/// Evaluate every rule for one endpoint against `ctx`, collecting
/// violations across all rules (fail-fast within a single rule's checks).
pub fn validate(rules: &[ApiValidation], ctx: &RequestContext) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();

    for rule in rules {
        let present_as_value = if rule.source == ParamSource::Body {
            ctx.body_value(&rule.param_name)
        } else {
            ctx.raw(rule.source, &rule.param_name).map(Value::String)
        };

        let Some(value) = present_as_value.filter(|v| !is_empty(v)) else {
            if rule.required {
                violations.push(Violation::new(&rule.param_name, "required", "missing or empty"));
            }
            continue;
        };

        validate_rule(rule, &value, &mut violations);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn is_empty(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}

fn validate_rule(rule: &ApiValidation, value: &Value, violations: &mut Vec<Violation>) {
    if let Some(expected_type) = rule.param_type {
        if !type_matches(expected_type, value) {
            violations.push(Violation::new(&rule.param_name, "type", format!("{expected_type:?} expected")));
            return;
        }
    }

    if let Value::String(s) = value {
        if let Some(min) = rule.min_length {
            if (s.chars().count() as i64) < min {
                violations.push(Violation::new(&rule.param_name, "minLength", format!("shorter than {min}")));
            }
        }
        if let Some(max) = rule.max_length {
            if (s.chars().count() as i64) > max {
                violations.push(Violation::new(&rule.param_name, "maxLength", format!("longer than {max}")));
            }
        }
        if let Some(pattern) = &rule.pattern {
            match anchored(pattern) {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => violations.push(Violation::new(&rule.param_name, "pattern", format!("does not match {pattern}"))),
                Err(_) => violations.push(Violation::new(&rule.param_name, "pattern", "invalid pattern")),
            }
        }
    }

    if let Some(n) = numeric(value) {
        if let Some(min) = rule.minimum {
            if n < min {
                violations.push(Violation::new(&rule.param_name, "minimum", format!("below {min}")));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                violations.push(Violation::new(&rule.param_name, "maximum", format!("above {max}")));
            }
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn type_matches(expected: ParamType, value: &Value) -> bool {
    match (expected, value) {
        (ParamType::String, Value::String(_)) => true,
        (ParamType::Boolean, Value::String(s)) => s == "true" || s == "false",
        (ParamType::Boolean, Value::Bool(_)) => true,
        (ParamType::Integer, Value::String(s)) => s.parse::<i64>().is_ok(),
        (ParamType::Integer, Value::Number(n)) => n.as_f64().is_some_and(|f| f.fract() == 0.0),
        (ParamType::Number, Value::String(s)) => s.parse::<f64>().is_ok(),
        (ParamType::Number, Value::Number(_)) => true,
        (ParamType::Array, Value::Array(_)) => true,
        (ParamType::Object, Value::Object(_)) => true,
        _ => false,
    }
}

fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    if pattern.starts_with('^') && pattern.ends_with('$') {
        Regex::new(pattern)
    } else {
        Regex::new(&format!("^(?:{pattern})$"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(param_name: &str, source: ParamSource, required: bool) -> ApiValidation {
        ApiValidation {
            id: 1,
            endpoint_id: 1,
            param_name: param_name.to_string(),
            source,
            required,
            param_type: None,
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            pattern: None,
        }
    }

    #[test]
    fn missing_required_query_param_is_a_violation() {
        let ctx = RequestContext::default();
        let violations = validate(&[rule("worker_id", ParamSource::Query, true)], &ctx).unwrap_err();
        assert_eq!(violations[0].rule, "required");
    }

    #[test]
    fn present_optional_param_with_no_constraints_passes() {
        let mut ctx = RequestContext::default();
        ctx.query_params.insert("limit".to_string(), "10".to_string());
        assert!(validate(&[rule("limit", ParamSource::Query, false)], &ctx).is_ok());
    }

    #[test]
    fn type_mismatch_is_reported() {
        let mut r = rule("priority", ParamSource::Body, true);
        r.param_type = Some(ParamType::Integer);
        let mut ctx = RequestContext::default();
        ctx.body = serde_json::json!({"priority": "not-a-number"});
        let violations = validate(&[r], &ctx).unwrap_err();
        assert_eq!(violations[0].rule, "type");
    }
}
