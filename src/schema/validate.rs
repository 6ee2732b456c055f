//! Strict validation walker over the new-form schema.
//!
//! This is the authoritative acceptance path: `CompatSchema::validate`
//! always runs this walker, never the translated legacy shape. Keywords the
//! walker does not know are ignored (the schema dialect may grow without
//! breaking deployed callers); constraints it does know are enforced
//! strictly.

use serde_json::Value;

use super::ValidationError;

const MAX_DEPTH: usize = 32;

pub(crate) fn check(root: &Value, payload: &Value) -> Result<(), ValidationError> {
    check_node(root, root, payload, "$", 0)
}

fn check_node(
    root: &Value,
    schema: &Value,
    payload: &Value,
    path: &str,
    depth: usize,
) -> Result<(), ValidationError> {
    if depth > MAX_DEPTH {
        return Err(ValidationError::Constraint {
            path: path.to_string(),
            message: "schema nesting too deep".to_string(),
        });
    }

    let map = match schema {
        Value::Bool(true) => return Ok(()),
        Value::Bool(false) => {
            return Err(ValidationError::Constraint {
                path: path.to_string(),
                message: "schema rejects all values".to_string(),
            })
        }
        Value::Object(map) => map,
        // Malformed schema node: permissive, the translator already warned.
        _ => return Ok(()),
    };

    if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
        if let Some(target) = resolve_ref(root, reference) {
            return check_node(root, target, payload, path, depth + 1);
        }
        // Unresolvable reference: permissive.
        return Ok(());
    }

    if let Some(Value::Array(parts)) = map.get("allOf") {
        for part in parts {
            check_node(root, part, payload, path, depth + 1)?;
        }
    }

    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(branches)) = map.get(key) {
            let matched = branches
                .iter()
                .any(|b| check_node(root, b, payload, path, depth + 1).is_ok());
            if !matched {
                return Err(ValidationError::Constraint {
                    path: path.to_string(),
                    message: "no union branch matched".to_string(),
                });
            }
        }
    }

    if let Some(literal) = map.get("const") {
        if payload != literal {
            return Err(ValidationError::Constraint {
                path: path.to_string(),
                message: format!("expected literal {}", literal),
            });
        }
    }

    if let Some(Value::Array(variants)) = map.get("enum") {
        if !variants.contains(payload) {
            return Err(ValidationError::Constraint {
                path: path.to_string(),
                message: format!("value not in enum: {}", payload),
            });
        }
    }

    match map.get("type") {
        Some(Value::String(tag)) => {
            if !type_matches(tag, payload) {
                return Err(ValidationError::TypeMismatch {
                    path: path.to_string(),
                    expected: tag.clone(),
                    actual: json_type_name(payload).to_string(),
                });
            }
        }
        Some(Value::Array(tags)) => {
            let matched = tags
                .iter()
                .filter_map(Value::as_str)
                .any(|t| type_matches(t, payload));
            if !matched {
                let expected: Vec<&str> = tags.iter().filter_map(Value::as_str).collect();
                return Err(ValidationError::TypeMismatch {
                    path: path.to_string(),
                    expected: expected.join(" | "),
                    actual: json_type_name(payload).to_string(),
                });
            }
        }
        _ => {}
    }

    match payload {
        Value::String(s) => check_string(map, s, path)?,
        Value::Number(_) => check_number(map, payload, path)?,
        Value::Object(fields) => check_object(root, map, fields, path, depth)?,
        Value::Array(items) => check_array(root, map, items, path, depth)?,
        _ => {}
    }

    Ok(())
}

fn check_string(
    map: &serde_json::Map<String, Value>,
    s: &str,
    path: &str,
) -> Result<(), ValidationError> {
    let constraint = |message: String| ValidationError::Constraint {
        path: path.to_string(),
        message,
    };

    let chars = s.chars().count() as u64;
    if let Some(min) = map.get("minLength").and_then(Value::as_u64) {
        if chars < min {
            return Err(constraint(format!("string shorter than {} characters", min)));
        }
    }
    if let Some(max) = map.get("maxLength").and_then(Value::as_u64) {
        if chars > max {
            return Err(constraint(format!("string longer than {} characters", max)));
        }
    }

    match map.get("format").and_then(Value::as_str) {
        Some("email") if !looks_like_email(s) => {
            Err(constraint("not a valid email address".to_string()))
        }
        Some("uri") if !looks_like_uri(s) => Err(constraint("not a valid URI".to_string())),
        Some("uuid") if uuid::Uuid::parse_str(s).is_err() => {
            Err(constraint("not a valid UUID".to_string()))
        }
        // Unknown formats are annotations, not constraints.
        _ => Ok(()),
    }
}

fn check_number(
    map: &serde_json::Map<String, Value>,
    payload: &Value,
    path: &str,
) -> Result<(), ValidationError> {
    let n = payload.as_f64().unwrap_or(0.0);
    if let Some(min) = map.get("minimum").and_then(Value::as_f64) {
        if n < min {
            return Err(ValidationError::Constraint {
                path: path.to_string(),
                message: format!("value below minimum {}", min),
            });
        }
    }
    if let Some(max) = map.get("maximum").and_then(Value::as_f64) {
        if n > max {
            return Err(ValidationError::Constraint {
                path: path.to_string(),
                message: format!("value above maximum {}", max),
            });
        }
    }
    Ok(())
}

fn check_object(
    root: &Value,
    map: &serde_json::Map<String, Value>,
    fields: &serde_json::Map<String, Value>,
    path: &str,
    depth: usize,
) -> Result<(), ValidationError> {
    if let Some(Value::Array(required)) = map.get("required") {
        for name in required.iter().filter_map(Value::as_str) {
            if !fields.contains_key(name) {
                return Err(ValidationError::MissingField {
                    path: path.to_string(),
                    field: name.to_string(),
                });
            }
        }
    }

    let empty = serde_json::Map::new();
    let properties = match map.get("properties") {
        Some(Value::Object(props)) => props,
        _ => &empty,
    };

    for (name, value) in fields {
        let field_path = format!("{}.{}", path, name);
        if let Some(prop_schema) = properties.get(name) {
            check_node(root, prop_schema, value, &field_path, depth + 1)?;
        } else {
            match map.get("additionalProperties") {
                Some(Value::Bool(false)) => {
                    return Err(ValidationError::UnknownField {
                        path: path.to_string(),
                        field: name.clone(),
                    });
                }
                Some(extra @ Value::Object(_)) => {
                    check_node(root, extra, value, &field_path, depth + 1)?;
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn check_array(
    root: &Value,
    map: &serde_json::Map<String, Value>,
    items: &[Value],
    path: &str,
    depth: usize,
) -> Result<(), ValidationError> {
    let constraint = |message: String| ValidationError::Constraint {
        path: path.to_string(),
        message,
    };

    if let Some(min) = map.get("minItems").and_then(Value::as_u64) {
        if (items.len() as u64) < min {
            return Err(constraint(format!("fewer than {} items", min)));
        }
    }
    if let Some(max) = map.get("maxItems").and_then(Value::as_u64) {
        if (items.len() as u64) > max {
            return Err(constraint(format!("more than {} items", max)));
        }
    }

    if let Some(Value::Array(prefix)) = map.get("prefixItems") {
        for (i, (schema, value)) in prefix.iter().zip(items.iter()).enumerate() {
            let item_path = format!("{}[{}]", path, i);
            check_node(root, schema, value, &item_path, depth + 1)?;
        }
        return Ok(());
    }

    if let Some(item_schema) = map.get("items") {
        for (i, value) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, i);
            check_node(root, item_schema, value, &item_path, depth + 1)?;
        }
    }

    Ok(())
}

fn type_matches(tag: &str, payload: &Value) -> bool {
    match tag {
        "string" => payload.is_string(),
        "object" => payload.is_object(),
        "array" => payload.is_array(),
        "boolean" => payload.is_boolean(),
        "null" => payload.is_null(),
        "number" => payload.is_number(),
        "integer" => payload.is_i64() || payload.is_u64(),
        _ => true,
    }
}

fn json_type_name(payload: &Value) -> &'static str {
    match payload {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn looks_like_uri(s: &str) -> bool {
    match s.split_once(':') {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && !rest.is_empty()
        }
        None => false,
    }
}

fn resolve_ref<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    root.pointer(pointer)
}
