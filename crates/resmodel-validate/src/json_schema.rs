//! # JSON Schema Backend
//!
//! An alternative [`StructuralValidator`] that compiles a type's `validate`
//! tags into a JSON Schema (Draft 2020-12) and evaluates it with the
//! `jsonschema` crate.
//!
//! ## Instance Normalization
//!
//! Before validation the instance is normalized against the shape so that
//! every declared field is present: absent optional fields become `null`,
//! absent non-optional scalars take their zero value, and absent
//! non-optional structs become objects. Violations then always land on the
//! offending field's own instance path, which is translated back into a
//! canonical path and a wire target by walking the shape.
//!
//! Compiled validators are cached per root type (`TypeId`). Maps built
//! without a type identity are compiled on every call.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::{Draft, Validator};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};

use resmodel_core::{join, Field, ScalarKind, SchemaMap, Shape, StructKey, StructShape};

use crate::structural::{FieldViolation, Rule, StructuralValidator};
use crate::value;

/// Pattern for a lowercase RFC 1035 label.
const DNS_LABEL_PATTERN: &str = "^[a-z]([-a-z0-9]{0,61}[a-z0-9])?$";
/// Pattern for an IPv4 CIDR range.
const CIDRV4_PATTERN: &str = r"^((25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(25[0-5]|2[0-4]\d|1?\d?\d)/(3[0-2]|[12]?\d)$";
/// Pattern for any subscription-scoped resource ID.
const RESOURCE_ID_PATTERN: &str =
    "(?i)^/subscriptions/[^/]+(/resourceGroups/[^/]+)?(/providers/[^/]+(/[^/]+/[^/]+)+)?$";

/// Structural validation through a generated JSON Schema.
#[derive(Default)]
pub struct JsonSchemaValidator {
    compiled: RwLock<HashMap<TypeId, Arc<Validator>>>,
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("compiled", &self.compiled.read().len())
            .finish()
    }
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The JSON Schema generated for `shape`.
    pub fn schema_for(shape: &Shape) -> Value {
        let mut stack = Vec::new();
        let mut schema = shape_schema(shape, &mut stack);
        if let Value::Object(obj) = &mut schema {
            obj.insert(
                "$schema".to_string(),
                json!("https://json-schema.org/draft/2020-12/schema"),
            );
        }
        schema
    }

    /// Fill in every declared field so violations attach to the field itself.
    pub fn normalize(shape: &Shape, value: &Value) -> Value {
        let mut stack = Vec::new();
        normalize_value(shape, value, &mut stack)
    }

    /// Number of types with a compiled validator.
    pub fn cached_types(&self) -> usize {
        self.compiled.read().len()
    }

    fn compile(shape: &Shape) -> Result<Arc<Validator>, String> {
        let schema = Self::schema_for(shape);
        let mut opts = jsonschema::options();
        opts.with_draft(Draft::Draft202012);
        opts.should_validate_formats(true);
        Ok(Arc::new(opts.build(&schema).map_err(|e| e.to_string())?))
    }

    fn compiled(&self, shape: &Shape, schema: &SchemaMap) -> Result<Arc<Validator>, String> {
        let Some(key) = schema.type_id() else {
            return Self::compile(shape);
        };
        if let Some(v) = self.compiled.read().get(&key) {
            return Ok(Arc::clone(v));
        }

        let mut compiled = self.compiled.write();
        if let Some(v) = compiled.get(&key) {
            return Ok(Arc::clone(v));
        }

        let validator = Self::compile(shape)?;
        tracing::debug!(type_name = schema.type_name(), "compiled json schema validator");
        compiled.insert(key, Arc::clone(&validator));
        Ok(validator)
    }
}

impl StructuralValidator for JsonSchemaValidator {
    fn name(&self) -> &'static str {
        "json_schema"
    }

    fn validate(&self, shape: &Shape, schema: &SchemaMap, value: &Value) -> Vec<FieldViolation> {
        let validator = match self.compiled(shape, schema) {
            Ok(v) => v,
            Err(reason) => {
                tracing::error!(%reason, "json schema generation failed");
                return vec![FieldViolation {
                    path: String::new(),
                    target: String::new(),
                    field: String::new(),
                    rule: "schema".to_string(),
                    param: String::new(),
                    value: Value::Null,
                    description: Some(reason),
                }];
            }
        };

        let instance = Self::normalize(shape, value);
        let mut out: Vec<FieldViolation> = Vec::new();
        for error in validator.iter_errors(&instance) {
            let pointer = error.instance_path.to_string();
            let offending = instance.pointer(&pointer).cloned().unwrap_or(Value::Null);
            let location = locate(shape, &pointer);

            let (path, target, field) = match &location {
                Some(loc) => (loc.path.clone(), loc.target.clone(), Some(&loc.field)),
                None => (String::new(), String::new(), None),
            };
            // One violation per field, like the tag validator.
            if out.iter().any(|v| v.target == target) {
                continue;
            }

            let is_required_failure = field.is_some_and(|f| {
                has_rule(f, |r| matches!(r, Rule::Required))
                    && (offending.is_null() || resmodel_core::is_zero_value(&offending))
            });
            out.push(FieldViolation {
                path,
                target,
                field: field.map(|f| f.json_name().to_string()).unwrap_or_default(),
                rule: (if is_required_failure { "required" } else { "schema" }).to_string(),
                param: String::new(),
                value: offending,
                description: (!is_required_failure).then(|| error.to_string()),
            });
        }
        out
    }
}

fn rules_of(field: &Field) -> Vec<Rule> {
    field.tag.rules().filter_map(Rule::parse).collect()
}

fn has_rule(field: &Field, pred: impl Fn(&Rule) -> bool) -> bool {
    rules_of(field).iter().any(pred)
}

fn scalar_type(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::String | ScalarKind::Timestamp => "string",
        ScalarKind::Bool => "boolean",
        ScalarKind::Integer | ScalarKind::Unsigned => "integer",
        ScalarKind::Float => "number",
    }
}

/// Schema for a shape, ignoring field rules.
fn shape_schema(shape: &Shape, stack: &mut Vec<StructKey>) -> Value {
    match shape {
        Shape::Scalar(kind) => json!({ "type": scalar_type(*kind) }),
        Shape::Optional(inner) => {
            let mut schema = shape_schema(&inner(), stack);
            allow_null(&mut schema);
            schema
        }
        Shape::Sequence(inner) => json!({
            "type": ["array", "null"],
            "items": shape_schema(&inner(), stack),
        }),
        Shape::Map(inner) => json!({
            "type": ["object", "null"],
            "additionalProperties": shape_schema(&inner(), stack),
        }),
        Shape::Struct(s) => struct_schema(s, stack),
    }
}

fn struct_schema(s: &StructShape, stack: &mut Vec<StructKey>) -> Value {
    if s.key().is_in(stack) {
        return json!({});
    }
    stack.push(s.key());
    let mut properties = Map::new();
    collect_properties(s, stack, &mut properties);
    stack.pop();
    json!({ "type": "object", "properties": properties })
}

fn collect_properties(s: &StructShape, stack: &mut Vec<StructKey>, out: &mut Map<String, Value>) {
    for field in s.fields.iter().filter(|f| f.exported) {
        let field_shape = (field.shape)();
        if field.embedded {
            if let Shape::Struct(inner) = field_shape.unwrapped() {
                collect_properties(&inner, stack, out);
            }
            continue;
        }
        let schema = field_schema(field, &field_shape, stack);
        out.insert(field.json_name().to_string(), schema);
    }
}

/// Schema for one field: its shape plus the keywords its rules compile to.
fn field_schema(field: &Field, shape: &Shape, stack: &mut Vec<StructKey>) -> Value {
    let mut schema = shape_schema(shape, stack);
    let rules = rules_of(field);
    let element = match shape {
        Shape::Optional(inner) => inner(),
        other => other.clone(),
    };

    let mut omitempty = false;
    if let Value::Object(obj) = &mut schema {
        for rule in &rules {
            match rule {
                Rule::Required => {
                    forbid_null(obj);
                    if matches!(shape, Shape::Scalar(_)) {
                        add_zero_exclusion(obj, &element);
                    }
                }
                Rule::OmitEmpty => omitempty = true,
                Rule::OneOf(words) => {
                    let mut allowed: Vec<Value> = words.iter().map(|w| json!(w)).collect();
                    if matches!(shape, Shape::Optional(_)) {
                        allowed.push(Value::Null);
                    }
                    obj.insert("enum".to_string(), Value::Array(allowed));
                }
                Rule::Min(n) => {
                    obj.insert(bound_keyword(&element, true).to_string(), bound_value(*n));
                }
                Rule::Max(n) => {
                    obj.insert(bound_keyword(&element, false).to_string(), bound_value(*n));
                }
                Rule::StartsWith(prefix) => {
                    obj.insert("pattern".to_string(), json!(format!("^{}", escape_regex(prefix))));
                }
                Rule::Ipv4 => {
                    obj.insert("format".to_string(), json!("ipv4"));
                }
                Rule::CidrV4 => {
                    obj.insert("pattern".to_string(), json!(CIDRV4_PATTERN));
                }
                Rule::DnsLabel => {
                    obj.insert("pattern".to_string(), json!(DNS_LABEL_PATTERN));
                }
                Rule::Url => {
                    obj.insert("format".to_string(), json!("uri"));
                }
                Rule::Uuid => {
                    obj.insert("format".to_string(), json!("uuid"));
                }
                Rule::ResourceId(expected) => {
                    obj.insert("pattern".to_string(), json!(resource_id_pattern(expected.as_deref())));
                }
            }
        }
    }

    if omitempty {
        json!({ "anyOf": [{ "enum": [null, "", 0, false, [], {}] }, schema] })
    } else {
        schema
    }
}

fn allow_null(schema: &mut Value) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };
    let nullable = match obj.get("type") {
        Some(Value::String(t)) => Some(json!([t, "null"])),
        Some(Value::Array(types)) if !types.iter().any(|t| t == "null") => {
            let mut types = types.clone();
            types.push(json!("null"));
            Some(Value::Array(types))
        }
        _ => None,
    };
    if let Some(types) = nullable {
        obj.insert("type".to_string(), types);
    }
}

fn forbid_null(obj: &mut Map<String, Value>) {
    if let Some(Value::Array(types)) = obj.get_mut("type") {
        types.retain(|t| t != "null");
    }
}

fn add_zero_exclusion(obj: &mut Map<String, Value>, element: &Shape) {
    match element {
        Shape::Scalar(ScalarKind::String | ScalarKind::Timestamp) => {
            obj.insert("minLength".to_string(), json!(1));
        }
        Shape::Scalar(ScalarKind::Bool) => {
            obj.insert("const".to_string(), json!(true));
        }
        Shape::Scalar(_) => {
            obj.insert("not".to_string(), json!({ "const": 0 }));
        }
        _ => {}
    }
}

fn bound_keyword(element: &Shape, lower: bool) -> &'static str {
    match (element, lower) {
        (Shape::Scalar(ScalarKind::String | ScalarKind::Timestamp), true) => "minLength",
        (Shape::Scalar(ScalarKind::String | ScalarKind::Timestamp), false) => "maxLength",
        (Shape::Sequence(_), true) => "minItems",
        (Shape::Sequence(_), false) => "maxItems",
        (Shape::Map(_), true) => "minProperties",
        (Shape::Map(_), false) => "maxProperties",
        (_, true) => "minimum",
        (_, false) => "maximum",
    }
}

fn bound_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= 0.0 && n < u64::MAX as f64 {
        json!(n as u64)
    } else {
        json!(n)
    }
}

fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$/".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn resource_id_pattern(expected: Option<&str>) -> String {
    let Some(expected) = expected else {
        return RESOURCE_ID_PATTERN.to_string();
    };
    let mut parts = expected.split('/');
    let namespace = parts.next().unwrap_or_default();
    let types: Vec<String> = parts.map(|t| format!("/{}/[^/]+", escape_regex(t))).collect();
    format!(
        "(?i)^/subscriptions/[^/]+/resourceGroups/[^/]+/providers/{}{}$",
        escape_regex(namespace),
        types.concat()
    )
}

fn normalize_value(shape: &Shape, value: &Value, stack: &mut Vec<StructKey>) -> Value {
    match shape {
        Shape::Scalar(kind) => match value {
            Value::Null => value::scalar_zero(*kind),
            other => other.clone(),
        },
        Shape::Optional(inner) => match value {
            Value::Null => Value::Null,
            other => normalize_value(&inner(), other, stack),
        },
        Shape::Sequence(inner) => match value {
            Value::Array(items) => {
                let inner = inner();
                Value::Array(items.iter().map(|v| normalize_value(&inner, v, stack)).collect())
            }
            other => other.clone(),
        },
        Shape::Map(inner) => match value {
            Value::Object(members) => {
                let inner = inner();
                Value::Object(
                    members
                        .iter()
                        .map(|(k, v)| (k.clone(), normalize_value(&inner, v, stack)))
                        .collect(),
                )
            }
            other => other.clone(),
        },
        Shape::Struct(s) => {
            if s.key().is_in(stack) {
                return value.clone();
            }
            let mut members = match value {
                Value::Object(m) => m.clone(),
                Value::Null => Map::new(),
                other => return other.clone(),
            };
            stack.push(s.key());
            normalize_members(s, &mut members, stack);
            stack.pop();
            Value::Object(members)
        }
    }
}

fn normalize_members(s: &StructShape, members: &mut Map<String, Value>, stack: &mut Vec<StructKey>) {
    for field in s.fields.iter().filter(|f| f.exported) {
        let field_shape = (field.shape)();
        if field.embedded {
            if let Shape::Struct(inner) = field_shape.unwrapped() {
                normalize_members(&inner, members, stack);
            }
            continue;
        }
        let name = field.json_name();
        let current = members.get(name).cloned().unwrap_or(Value::Null);
        members.insert(name.to_string(), normalize_value(&field_shape, &current, stack));
    }
}

struct Location {
    path: String,
    target: String,
    field: Field,
}

/// Translate a JSON pointer into the canonical path, wire target and field
/// it addresses.
fn locate(shape: &Shape, pointer: &str) -> Option<Location> {
    let segments: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();

    let mut current = shape.clone();
    let mut path = String::new();
    let mut target = String::new();
    let mut field: Option<Field> = None;
    let mut i = 0;
    while i < segments.len() {
        let segment = &segments[i];
        match current {
            Shape::Optional(inner) => {
                current = inner();
                continue;
            }
            Shape::Sequence(inner) => {
                target = format!("{target}[{segment}]");
                current = inner();
            }
            Shape::Map(inner) => {
                target = value::key_subscript(&target, segment);
                current = inner();
            }
            Shape::Struct(s) => {
                let found = find_field(&s, segment)?;
                path = join(&path, found.name);
                target = join(&target, found.json_name());
                current = (found.shape)();
                field = Some(found);
            }
            Shape::Scalar(_) => return None,
        }
        i += 1;
    }

    field.map(|field| Location { path, target, field })
}

fn find_field(s: &StructShape, json_name: &str) -> Option<Field> {
    for field in s.fields.iter().filter(|f| f.exported) {
        if field.embedded {
            if let Shape::Struct(inner) = (field.shape)().unwrapped() {
                if let Some(found) = find_field(&inner, json_name) {
                    return Some(found);
                }
            }
        } else if field.json_name() == json_name {
            return Some(field.clone());
        }
    }
    None
}
