//! New-form → legacy schema translation.
//!
//! Recursively walks the new schema's node kinds (object, string with
//! refinements, enum, array, union, optional, literal) and constructs the
//! structurally equivalent legacy node. Anything else degrades to an
//! accept-anything node with a warning — failing closed here would break
//! previously-working tool definitions.

use serde_json::{json, Map, Value};
use tracing::warn;

const MAX_DEPTH: usize = 16;

/// String formats translated by name. Unknown formats are dropped from the
/// legacy shape (validation of the new form still ignores them).
const KNOWN_FORMATS: [&str; 3] = ["email", "uri", "uuid"];

/// Keywords the translator understands. A non-empty node containing none of
/// these is an unrecognized node kind.
const RECOGNIZED_KEYWORDS: [&str; 23] = [
    "$ref",
    "$schema",
    "$defs",
    "definitions",
    "const",
    "enum",
    "anyOf",
    "oneOf",
    "allOf",
    "type",
    "properties",
    "required",
    "additionalProperties",
    "items",
    "prefixItems",
    "minItems",
    "maxItems",
    "minLength",
    "maxLength",
    "format",
    "minimum",
    "maximum",
    "title",
];

/// Translate a new-form schema into the legacy object shape.
pub(crate) fn to_legacy(root: &Value) -> Value {
    translate_node(root, root, 0)
}

fn translate_node(root: &Value, node: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        warn!("schema nesting exceeds translation depth, falling back open");
        return json!({});
    }

    let map = match node {
        Value::Bool(true) => return json!({}),
        Value::Bool(false) => return json!({"not": {}}),
        Value::Object(map) => map,
        _ => {
            warn!("malformed schema node, falling back open");
            return json!({});
        }
    };

    if map.is_empty() {
        return json!({});
    }

    // Inline local references: the legacy shape carries no $defs table.
    if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
        return match resolve_ref(root, reference) {
            Some(target) => translate_node(root, target, depth + 1),
            None => {
                warn!(reference, "unresolvable $ref, falling back open");
                json!({})
            }
        };
    }

    if !map.keys().any(|k| RECOGNIZED_KEYWORDS.contains(&k.as_str())
        || k == "description")
    {
        warn!("unrecognized schema node kind, falling back open");
        return json!({});
    }

    let mut out = Map::new();
    for key in ["title", "description"] {
        if let Some(v) = map.get(key) {
            out.insert(key.to_string(), v.clone());
        }
    }

    // Literal: the legacy form has no `const`.
    if let Some(literal) = map.get("const") {
        out.insert("enum".to_string(), json!([literal]));
        return Value::Object(out);
    }

    if let Some(variants) = map.get("enum") {
        out.insert("enum".to_string(), variants.clone());
        if let Some(t) = map.get("type").and_then(Value::as_str) {
            out.insert("type".to_string(), json!(t));
        }
        return Value::Object(out);
    }

    // Unions: both spellings collapse to the legacy `anyOf`.
    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(branches)) = map.get(key) {
            let translated: Vec<Value> = branches
                .iter()
                .map(|b| translate_node(root, b, depth + 1))
                .collect();
            out.insert("anyOf".to_string(), Value::Array(translated));
            return Value::Object(out);
        }
    }

    if let Some(Value::Array(parts)) = map.get("allOf") {
        let translated: Vec<Value> = parts
            .iter()
            .map(|p| translate_node(root, p, depth + 1))
            .collect();
        out.insert("allOf".to_string(), Value::Array(translated));
        return Value::Object(out);
    }

    match map.get("type") {
        Some(Value::String(tag)) => {
            translate_typed(root, map, tag, &mut out, depth);
            Value::Object(out)
        }
        Some(Value::Array(tags)) => translate_type_union(root, map, tags, out, depth),
        _ => {
            // Bare refinements without a type tag (rare but legal): keep
            // whatever constraints we recognize.
            translate_typed(root, map, "", &mut out, depth);
            Value::Object(out)
        }
    }
}

/// Translate a node with a single `type` tag into `out`.
fn translate_typed(
    root: &Value,
    map: &Map<String, Value>,
    tag: &str,
    out: &mut Map<String, Value>,
    depth: usize,
) {
    if !tag.is_empty() {
        out.insert("type".to_string(), json!(tag));
    }

    match tag {
        "object" => {
            if let Some(Value::Object(properties)) = map.get("properties") {
                let mut translated = Map::new();
                for (name, prop) in properties {
                    translated.insert(name.clone(), translate_node(root, prop, depth + 1));
                }
                out.insert("properties".to_string(), Value::Object(translated));
            }
            if let Some(required) = map.get("required") {
                out.insert("required".to_string(), required.clone());
            }
            match map.get("additionalProperties") {
                Some(Value::Bool(b)) => {
                    out.insert("additionalProperties".to_string(), json!(b));
                }
                Some(schema @ Value::Object(_)) => {
                    out.insert(
                        "additionalProperties".to_string(),
                        translate_node(root, schema, depth + 1),
                    );
                }
                _ => {}
            }
        }
        "array" => {
            if let Some(items) = map.get("items") {
                out.insert("items".to_string(), translate_node(root, items, depth + 1));
            } else if let Some(Value::Array(prefix)) = map.get("prefixItems") {
                // Tuples: the legacy form spells positional items as an array.
                let translated: Vec<Value> = prefix
                    .iter()
                    .map(|p| translate_node(root, p, depth + 1))
                    .collect();
                out.insert("items".to_string(), Value::Array(translated));
            }
            for key in ["minItems", "maxItems"] {
                if let Some(v) = map.get(key) {
                    out.insert(key.to_string(), v.clone());
                }
            }
        }
        _ => {
            for key in ["minLength", "maxLength", "minimum", "maximum"] {
                if let Some(v) = map.get(key) {
                    out.insert(key.to_string(), v.clone());
                }
            }
            if let Some(format) = map.get("format").and_then(Value::as_str) {
                if KNOWN_FORMATS.contains(&format) {
                    out.insert("format".to_string(), json!(format));
                } else {
                    warn!(format, "unknown string format dropped from legacy schema");
                }
            }
        }
    }
}

/// Translate a union type array (the new form's optional/nullable spelling).
fn translate_type_union(
    root: &Value,
    map: &Map<String, Value>,
    tags: &[Value],
    out: Map<String, Value>,
    depth: usize,
) -> Value {
    let non_null: Vec<&str> = tags
        .iter()
        .filter_map(Value::as_str)
        .filter(|t| *t != "null")
        .collect();

    match non_null.as_slice() {
        // Optional: collapse `["T", "null"]` to plain `T`; the parent's
        // `required` list already expresses the optionality.
        [single] => {
            let mut narrowed = map.clone();
            narrowed.insert("type".to_string(), json!(single));
            translate_node(root, &Value::Object(narrowed), depth + 1)
        }
        [] => {
            let mut out = out;
            out.insert("type".to_string(), json!("null"));
            Value::Object(out)
        }
        many => {
            let branches: Vec<Value> = many
                .iter()
                .map(|t| {
                    let mut narrowed = map.clone();
                    narrowed.insert("type".to_string(), json!(*t));
                    translate_node(root, &Value::Object(narrowed), depth + 1)
                })
                .collect();
            let mut out = out;
            out.insert("anyOf".to_string(), Value::Array(branches));
            Value::Object(out)
        }
    }
}

/// Resolve a local `#/`-prefixed reference against the root schema.
fn resolve_ref<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    root.pointer(pointer)
}
