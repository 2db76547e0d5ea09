//! # Visibility Enforcement
//!
//! Runtime use of a [`VisibilityMap`] over decoded request bodies:
//!
//! - [`check_visibility`] compares a new value against the current one and
//!   rejects changes to fields the request kind may not touch.
//! - [`render_read`] strips fields that are not readable from a response.
//! - [`copy_read_only_values`] carries read-only values from the stored
//!   resource into an incoming one that left them empty.
//!
//! All three walk the value alongside its [`Shape`]. Visibility is looked
//! up by canonical path (no subscripts); error targets use the wire path
//! (with subscripts). Composite paths are `SKIP` and are never checked
//! themselves, only their leaves are. An absent composite is treated as an
//! empty object so every leaf beneath it is still compared.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use resmodel_core::{
    is_zero_value, join, ErrorDetail, RequestKind, ScalarKind, Shape, StructShape,
    VisibilityFlags, VisibilityMap,
};

use crate::value::{self, NULL};

/// Compare `new` against `current` and report every visibility violation.
///
/// For [`RequestKind::Create`] pass `Value::Null` as `current`.
/// [`RequestKind::Read`] never reports anything.
pub fn check_visibility(
    shape: &Shape,
    visibility: &VisibilityMap,
    kind: RequestKind,
    new: &Value,
    current: &Value,
) -> Vec<ErrorDetail> {
    if kind == RequestKind::Read {
        return Vec::new();
    }
    let mut checker = Checker {
        visibility,
        updating: kind == RequestKind::Update,
        errors: Vec::new(),
    };
    checker.recurse(shape, new, current, "", "", "");
    checker.errors
}

struct Checker<'a> {
    visibility: &'a VisibilityMap,
    updating: bool,
    errors: Vec<ErrorDetail>,
}

impl Checker<'_> {
    /// `key` is the canonical path used for visibility lookup. `namespace`
    /// and `fieldname` together form the wire target.
    fn recurse(&mut self, shape: &Shape, new: &Value, cur: &Value, key: &str, namespace: &str, fieldname: &str) {
        let flags = self.visibility.flags(key);

        match shape {
            Shape::Scalar(kind) => {
                if !scalar_equal(new, cur, *kind, flags.case_insensitive()) {
                    self.check(flags, namespace, fieldname, false);
                }
            }

            Shape::Optional(inner) => {
                if flags.is_skip() {
                    self.recurse(&inner(), new, cur, key, namespace, fieldname);
                    return;
                }
                let (new_nil, cur_nil) = if flags.is_nullable() {
                    (new.is_null(), cur.is_null())
                } else {
                    (is_zero_value(new), is_zero_value(cur))
                };
                if new_nil != cur_nil && !self.check(flags, namespace, fieldname, new.is_null()) {
                    return;
                }
                if !new.is_null() && !cur.is_null() {
                    self.recurse(&inner(), new, cur, key, namespace, fieldname);
                }
            }

            Shape::Sequence(inner) => {
                let inner = inner();
                let empty = Vec::new();
                let new_items = new.as_array().unwrap_or(&empty);
                let cur_items = cur.as_array().unwrap_or(&empty);

                if flags.is_skip() {
                    for i in 0..new_items.len().max(cur_items.len()) {
                        let name = value::index_subscript(fieldname, i);
                        let n = new_items.get(i).unwrap_or(&NULL);
                        let c = cur_items.get(i).unwrap_or(&NULL);
                        self.recurse(&inner, n, c, key, namespace, &name);
                    }
                    return;
                }

                let new_nil = new_items.is_empty();
                let cur_nil = cur_items.is_empty();
                if new_nil != cur_nil {
                    self.check(flags, namespace, fieldname, new_nil);
                    return;
                }
                if new_items.len() != cur_items.len() {
                    self.check(flags, namespace, fieldname, false);
                    return;
                }
                for (i, (n, c)) in new_items.iter().zip(cur_items).enumerate() {
                    let name = value::index_subscript(fieldname, i);
                    self.recurse(&inner, n, c, key, namespace, &name);
                }
            }

            Shape::Map(inner) => {
                let inner = inner();
                let empty = Map::new();
                let new_members = new.as_object().unwrap_or(&empty);
                let cur_members = cur.as_object().unwrap_or(&empty);

                if flags.is_skip() {
                    let keys: BTreeSet<&String> = new_members.keys().chain(cur_members.keys()).collect();
                    for k in keys {
                        let name = value::key_subscript(fieldname, k);
                        let n = new_members.get(k.as_str()).unwrap_or(&NULL);
                        let c = cur_members.get(k.as_str()).unwrap_or(&NULL);
                        self.recurse(&inner, n, c, key, namespace, &name);
                    }
                    return;
                }

                let new_nil = new_members.is_empty();
                let keys_equal = new_nil == cur_members.is_empty()
                    && new_members.len() == cur_members.len()
                    && new_members.keys().all(|k| cur_members.contains_key(k));
                if !keys_equal && !self.check(flags, namespace, fieldname, new_nil) {
                    return;
                }
                for (k, n) in new_members {
                    let name = value::key_subscript(fieldname, k);
                    let c = cur_members.get(k).unwrap_or(&NULL);
                    self.recurse(&inner, n, c, key, namespace, &name);
                }
            }

            Shape::Struct(s) => {
                for field in s.fields.iter().filter(|f| f.exported) {
                    let field_shape = (field.shape)();
                    if field.embedded {
                        self.recurse(&field_shape, new, cur, key, namespace, fieldname);
                        continue;
                    }
                    let json_name = field.json_name();
                    self.recurse(
                        &field_shape,
                        value::member(new, json_name),
                        value::member(cur, json_name),
                        &join(key, field.name),
                        &join(namespace, fieldname),
                        json_name,
                    );
                }
            }
        }
    }

    /// Record a violation if `flags` forbid the change. Returns true when the
    /// change is allowed.
    fn check(&mut self, flags: VisibilityFlags, namespace: &str, fieldname: &str, new_is_nil: bool) -> bool {
        let message = if self.updating && new_is_nil && !flags.is_nullable() {
            format!("Field '{fieldname}' cannot be removed")
        } else if self.updating && !flags.can_update() {
            format!("Field '{fieldname}' cannot be updated")
        } else if flags.read_only() {
            format!("Field '{fieldname}' is read-only")
        } else if !self.updating && !flags.can_create() {
            format!("Field '{fieldname}' cannot be set on create")
        } else {
            return true;
        };

        self.errors.push(ErrorDetail::invalid_request_content(
            join(namespace, fieldname),
            message,
        ));
        false
    }
}

fn scalar_equal(a: &Value, b: &Value, kind: ScalarKind, case_insensitive: bool) -> bool {
    let zero = value::scalar_zero(kind);
    let a = if a.is_null() { &zero } else { a };
    let b = if b.is_null() { &zero } else { b };
    match (a, b) {
        (Value::String(x), Value::String(y)) if case_insensitive => x.to_lowercase() == y.to_lowercase(),
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// A copy of `value` without the fields that are not readable.
pub fn render_read(shape: &Shape, visibility: &VisibilityMap, value: &Value) -> Value {
    strip(shape, visibility, value, "")
}

fn strip(shape: &Shape, visibility: &VisibilityMap, value: &Value, key: &str) -> Value {
    match (shape, value) {
        (_, Value::Null) => Value::Null,
        (Shape::Optional(inner), _) => strip(&inner(), visibility, value, key),
        (Shape::Sequence(inner), Value::Array(items)) => {
            let inner = inner();
            Value::Array(items.iter().map(|v| strip(&inner, visibility, v, key)).collect())
        }
        (Shape::Map(inner), Value::Object(members)) => {
            let inner = inner();
            Value::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.clone(), strip(&inner, visibility, v, key)))
                    .collect(),
            )
        }
        (Shape::Struct(s), Value::Object(members)) => {
            let mut out = members.clone();
            strip_members(s, visibility, &mut out, key);
            Value::Object(out)
        }
        _ => value.clone(),
    }
}

fn strip_members(s: &StructShape, visibility: &VisibilityMap, members: &mut Map<String, Value>, key: &str) {
    for field in s.fields.iter().filter(|f| f.exported) {
        let field_shape = (field.shape)();
        if field.embedded {
            if let Shape::Struct(inner) = field_shape.unwrapped() {
                strip_members(&inner, visibility, members, key);
            }
            continue;
        }
        let field_key = join(key, field.name);
        let flags = visibility.flags(&field_key);
        let name = field.json_name();
        if !flags.is_skip() && !flags.can_read() {
            members.remove(name);
        } else if let Some(v) = members.get(name) {
            let stripped = strip(&field_shape, visibility, v, &field_key);
            members.insert(name.to_string(), stripped);
        }
    }
}

/// Copy read-only leaf values from `src` into `dst` wherever `dst` holds a
/// zero value.
pub fn copy_read_only_values(shape: &Shape, visibility: &VisibilityMap, src: &Value, dst: &mut Value) {
    copy_into(shape, visibility, src, dst, "");
}

fn copy_into(shape: &Shape, visibility: &VisibilityMap, src: &Value, dst: &mut Value, key: &str) {
    if src.is_null() {
        return;
    }
    match shape {
        Shape::Scalar(_) => {}
        Shape::Optional(inner) => copy_into(&inner(), visibility, src, dst, key),
        Shape::Sequence(inner) => {
            if let (Value::Array(s), Value::Array(d)) = (src, dst) {
                let inner = inner();
                for (sv, dv) in s.iter().zip(d.iter_mut()) {
                    copy_into(&inner, visibility, sv, dv, key);
                }
            }
        }
        Shape::Map(inner) => {
            if let (Value::Object(s), Value::Object(d)) = (src, dst) {
                let inner = inner();
                for (k, dv) in d.iter_mut() {
                    if let Some(sv) = s.get(k) {
                        copy_into(&inner, visibility, sv, dv, key);
                    }
                }
            }
        }
        Shape::Struct(s) => {
            if dst.is_null() {
                // Only materialize the object if something gets copied into it.
                let mut staged = Map::new();
                copy_members(s, visibility, src, &mut staged, key);
                if !staged.is_empty() {
                    *dst = Value::Object(staged);
                }
            } else if let Value::Object(d) = dst {
                copy_members(s, visibility, src, d, key);
            }
        }
    }
}

fn copy_members(s: &StructShape, visibility: &VisibilityMap, src: &Value, dst: &mut Map<String, Value>, key: &str) {
    for field in s.fields.iter().filter(|f| f.exported) {
        let field_shape = (field.shape)();
        if field.embedded {
            if let Shape::Struct(inner) = field_shape.unwrapped() {
                copy_members(&inner, visibility, src, dst, key);
            }
            continue;
        }
        let name = field.json_name();
        let sv = value::member(src, name);
        if sv.is_null() {
            continue;
        }
        let field_key = join(key, field.name);
        let flags = visibility.flags(&field_key);

        if flags.is_skip() {
            let mut dv = dst.get(name).cloned().unwrap_or(Value::Null);
            copy_into(&field_shape, visibility, sv, &mut dv, &field_key);
            if !dv.is_null() {
                dst.insert(name.to_string(), dv);
            }
        } else if flags.read_only() && dst.get(name).map_or(true, is_zero_value) {
            dst.insert(name.to_string(), sv.clone());
        }
    }
}
