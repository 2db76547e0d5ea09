//! # Structural Validation
//!
//! Single-field rule checking driven by the `validate` tags recorded in a
//! type's [`SchemaMap`]. The engine treats this as a swappable capability:
//! any [`StructuralValidator`] that turns a decoded value into a list of
//! [`FieldViolation`]s can be plugged in.
//!
//! [`TagValidator`] parses a type's rules once, on first use, and keeps the
//! parsed table per type.
//!
//! ## Rules
//!
//! | Rule | Holds when |
//! |------|------------|
//! | `required` | the field is present and non-zero |
//! | `omitempty` | always; later rules are skipped for zero values |
//! | `oneof=a b` | the value is one of the listed words |
//! | `min=n` / `max=n` | length (strings, sequences, maps) or value (numbers) is within bound |
//! | `startswith=p` | the string starts with `p` |
//! | `ipv4` / `cidrv4` | the string is an IPv4 address / network |
//! | `dns_rfc1035_label` | the string is a lowercase DNS label |
//! | `url` / `uuid` | the string parses as a URL / UUID |
//! | `resource_id[=type]` | the string is a resource ID, optionally of `type` |
//!
//! Each field reports at most its first failing rule. Optional fields that
//! are absent are only checked by `required`.

use std::any::TypeId;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use resmodel_core::{join, ContractError, ErrorDetail, Field, SchemaMap, Shape};

use crate::value;

/// One rule violation reported by a structural validator.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    /// Canonical field path.
    pub path: String,
    /// Wire path including subscripts; used as the error target.
    pub target: String,
    /// Wire name of the field.
    pub field: String,
    /// Rule tag that failed, e.g. `required` or `max`.
    pub rule: String,
    /// Rule parameter, empty when the rule takes none.
    pub param: String,
    /// The offending value.
    pub value: Value,
    /// Free-form explanation from validators that do not map to a known rule.
    pub description: Option<String>,
}

impl FieldViolation {
    /// Human-readable message for this violation.
    pub fn message(&self) -> String {
        if self.rule == "required" {
            return format!("Missing required field '{}'", self.field);
        }

        let mut message = format!(
            "Invalid value '{}' for field '{}'",
            value::display(&self.value),
            self.field
        );
        let p = &self.param;
        let hint = match self.rule.as_str() {
            "oneof" if p.split_whitespace().count() == 1 => format!(" (must be {p})"),
            "oneof" => format!(" (must be one of: {p})"),
            "min" if self.value.is_string() => format!(" (minimum length is {p})"),
            "min" if p == "0" => " (must be non-negative)".to_string(),
            "min" => format!(" (must be at least {p})"),
            "max" if self.value.is_string() => format!(" (maximum length is {p})"),
            "max" if p == "0" => " (must be non-positive)".to_string(),
            "max" => format!(" (must be at most {p})"),
            "startswith" => format!(" (must start with '{p}')"),
            "ipv4" => " (must be an IPv4 address)".to_string(),
            "cidrv4" => " (must be a v4 CIDR range)".to_string(),
            "dns_rfc1035_label" => " (must be a valid DNS RFC 1035 label)".to_string(),
            "url" => " (must be a URL)".to_string(),
            "uuid" => " (must be a UUID)".to_string(),
            "resource_id" if p.is_empty() => " (must be a valid resource ID)".to_string(),
            "resource_id" => format!(" (must be a valid '{p}' resource ID)"),
            _ => match &self.description {
                Some(d) => format!(" ({d})"),
                None => String::new(),
            },
        };
        message.push_str(&hint);
        message
    }

    pub fn to_error_detail(&self) -> ErrorDetail {
        ErrorDetail::invalid_request_content(self.target.clone(), self.message())
    }
}

/// The structural validator capability.
pub trait StructuralValidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Check `value` against the rules recorded in `schema`. `shape` is the
    /// descriptor of the same type and drives the descent through `value`.
    fn validate(&self, shape: &Shape, schema: &SchemaMap, value: &Value) -> Vec<FieldViolation>;
}

/// A parsed `validate` rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    OmitEmpty,
    OneOf(Vec<String>),
    Min(f64),
    Max(f64),
    StartsWith(String),
    Ipv4,
    CidrV4,
    DnsLabel,
    Url,
    Uuid,
    ResourceId(Option<String>),
}

impl Rule {
    /// Parse one comma-separated rule. `None` for unknown tags or
    /// malformed parameters.
    pub fn parse(raw: &str) -> Option<Self> {
        let (tag, param) = match raw.split_once('=') {
            Some((t, p)) => (t.trim(), Some(p.trim())),
            None => (raw.trim(), None),
        };
        let rule = match (tag, param) {
            ("required", None) => Self::Required,
            ("omitempty", None) => Self::OmitEmpty,
            ("oneof", Some(p)) if !p.is_empty() => {
                Self::OneOf(p.split_whitespace().map(str::to_string).collect())
            }
            ("min", Some(p)) => Self::Min(p.parse().ok()?),
            ("max", Some(p)) => Self::Max(p.parse().ok()?),
            ("startswith", Some(p)) if !p.is_empty() => Self::StartsWith(p.to_string()),
            ("ipv4", None) => Self::Ipv4,
            ("cidrv4", None) => Self::CidrV4,
            ("dns_rfc1035_label", None) => Self::DnsLabel,
            ("url", None) => Self::Url,
            ("uuid", None) => Self::Uuid,
            ("resource_id", None) => Self::ResourceId(None),
            ("resource_id", Some(p)) if !p.is_empty() => Self::ResourceId(Some(p.to_string())),
            _ => return None,
        };
        Some(rule)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::OmitEmpty => "omitempty",
            Self::OneOf(_) => "oneof",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::StartsWith(_) => "startswith",
            Self::Ipv4 => "ipv4",
            Self::CidrV4 => "cidrv4",
            Self::DnsLabel => "dns_rfc1035_label",
            Self::Url => "url",
            Self::Uuid => "uuid",
            Self::ResourceId(_) => "resource_id",
        }
    }

    pub fn param(&self) -> String {
        match self {
            Self::OneOf(words) => words.join(" "),
            Self::Min(n) | Self::Max(n) => format_bound(*n),
            Self::StartsWith(p) => p.clone(),
            Self::ResourceId(Some(t)) => t.clone(),
            _ => String::new(),
        }
    }

    /// Evaluate a value rule. `Required` and `OmitEmpty` are handled by the
    /// caller and always hold here.
    pub fn holds(&self, value: &Value) -> bool {
        match self {
            Self::Required | Self::OmitEmpty => true,
            Self::OneOf(words) => match value {
                Value::String(s) => words.iter().any(|w| w == s),
                Value::Number(n) => words.iter().any(|w| *w == n.to_string()),
                _ => false,
            },
            Self::Min(bound) => measure(value).map_or(true, |m| m >= *bound),
            Self::Max(bound) => measure(value).map_or(true, |m| m <= *bound),
            Self::StartsWith(prefix) => value.as_str().is_some_and(|s| s.starts_with(prefix.as_str())),
            Self::Ipv4 => value.as_str().is_some_and(|s| s.parse::<Ipv4Addr>().is_ok()),
            Self::CidrV4 => value.as_str().is_some_and(is_cidrv4),
            Self::DnsLabel => value.as_str().is_some_and(is_dns_rfc1035_label),
            Self::Url => value.as_str().is_some_and(|s| url::Url::parse(s).is_ok()),
            Self::Uuid => value.as_str().is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
            Self::ResourceId(expected) => value.as_str().is_some_and(|s| {
                match resource_type_of(s) {
                    Some(actual) => expected
                        .as_deref()
                        .map_or(true, |e| actual.eq_ignore_ascii_case(e)),
                    None => false,
                }
            }),
        }
    }
}

fn format_bound(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Length for strings, sequences and maps; the value itself for numbers.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Number(n) => n.as_f64(),
        Value::Array(a) => Some(a.len() as f64),
        Value::Object(o) => Some(o.len() as f64),
        _ => None,
    }
}

/// An IPv4 network address with prefix, host bits clear.
pub(crate) fn is_cidrv4(s: &str) -> bool {
    let Some((addr, prefix)) = s.split_once('/') else {
        return false;
    };
    let (Ok(addr), Ok(prefix)) = (addr.parse::<Ipv4Addr>(), prefix.parse::<u32>()) else {
        return false;
    };
    if prefix > 32 {
        return false;
    }
    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    u32::from(addr) & !mask == 0
}

/// 1-63 characters: lowercase letters, digits and `-`, starting with a
/// letter and ending with a letter or digit.
pub(crate) fn is_dns_rfc1035_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    let first_ok = bytes[0].is_ascii_lowercase();
    let last_ok = bytes[bytes.len() - 1].is_ascii_lowercase() || bytes[bytes.len() - 1].is_ascii_digit();
    first_ok
        && last_ok
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

/// Resource type of a resource ID such as
/// `/subscriptions/{s}/resourceGroups/{g}/providers/Ns.Provider/type/name`,
/// e.g. `Ns.Provider/type`. `None` when the string is not a resource ID.
pub(crate) fn resource_type_of(id: &str) -> Option<String> {
    let segments: Vec<&str> = id.strip_prefix('/')?.split('/').collect();
    if segments.iter().any(|s| s.is_empty())
        || segments.len() < 2
        || !segments[0].eq_ignore_ascii_case("subscriptions")
    {
        return None;
    }

    let mut rest = &segments[2..];
    let mut default_type = "Microsoft.Resources/subscriptions";
    if rest.len() >= 2 && rest[0].eq_ignore_ascii_case("resourceGroups") {
        rest = &rest[2..];
        default_type = "Microsoft.Resources/resourceGroups";
    }
    if rest.is_empty() {
        return Some(default_type.to_string());
    }
    if rest.len() < 4 || rest.len() % 2 != 0 || !rest[0].eq_ignore_ascii_case("providers") {
        return None;
    }
    let types: Vec<&str> = rest[2..].iter().step_by(2).copied().collect();
    Some(format!("{}/{}", rest[1], types.join("/")))
}

/// Parsed rules by canonical path for one type.
#[derive(Debug, Default)]
struct RuleTable(HashMap<String, Vec<Rule>>);

impl RuleTable {
    /// Unparseable rules are dropped here; [`TagValidator::check_rules`]
    /// is where they are reported.
    fn from_schema(schema: &SchemaMap) -> Self {
        let rules = schema
            .iter()
            .filter_map(|(path, info)| {
                let rules: Vec<Rule> = info.rules().filter_map(Rule::parse).collect();
                (!rules.is_empty()).then(|| (path.to_string(), rules))
            })
            .collect();
        Self(rules)
    }

    fn rules(&self, path: &str) -> &[Rule] {
        self.0.get(path).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// The default structural validator: evaluates `validate` tags.
#[derive(Debug, Default)]
pub struct TagValidator {
    tables: RwLock<HashMap<TypeId, Arc<RuleTable>>>,
}

impl TagValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of types whose rules have been parsed and kept.
    pub fn cached_types(&self) -> usize {
        self.tables.read().len()
    }

    fn rule_table(&self, schema: &SchemaMap) -> Arc<RuleTable> {
        let Some(key) = schema.type_id() else {
            return Arc::new(RuleTable::from_schema(schema));
        };
        if let Some(table) = self.tables.read().get(&key) {
            return Arc::clone(table);
        }
        let mut tables = self.tables.write();
        let table = tables.entry(key).or_insert_with(|| {
            tracing::debug!(type_name = schema.type_name(), "parsed validation rules");
            Arc::new(RuleTable::from_schema(schema))
        });
        Arc::clone(table)
    }

    /// Verify that every rule declared in `schema` parses.
    pub fn check_rules(schema: &SchemaMap) -> Result<(), ContractError> {
        for (path, info) in schema.iter() {
            for raw in info.rules() {
                if Rule::parse(raw).is_none() {
                    return Err(ContractError::InvalidRule {
                        path: path.to_string(),
                        rule: raw.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn visit_struct(
        table: &RuleTable,
        shape: &Shape,
        value: &Value,
        path: &str,
        target: &str,
        out: &mut Vec<FieldViolation>,
    ) {
        let Shape::Struct(s) = shape else {
            return;
        };
        for field in s.fields.iter().filter(|f| f.exported) {
            let field_shape = (field.shape)();
            if field.embedded {
                Self::visit_struct(table, &field_shape, value, path, target, out);
                continue;
            }
            let field_path = join(path, field.name);
            let field_target = join(target, field.json_name());
            let field_value = value::member(value, field.json_name());

            let rules = table.rules(&field_path);
            Self::check_field(field, rules, &field_shape, field_value, &field_path, &field_target, out);
            Self::descend(table, &field_shape, field_value, &field_path, &field_target, out);
        }
    }

    fn descend(
        table: &RuleTable,
        shape: &Shape,
        value: &Value,
        path: &str,
        target: &str,
        out: &mut Vec<FieldViolation>,
    ) {
        match shape {
            Shape::Optional(inner) => {
                if !value.is_null() {
                    Self::descend(table, &inner(), value, path, target, out);
                }
            }
            Shape::Sequence(inner) => {
                if let Value::Array(items) = value {
                    let inner = inner();
                    for (i, item) in items.iter().enumerate() {
                        Self::descend(table, &inner, item, path, &value::index_subscript(target, i), out);
                    }
                }
            }
            Shape::Map(inner) => {
                if let Value::Object(members) = value {
                    let inner = inner();
                    for (key, item) in members {
                        Self::descend(table, &inner, item, path, &value::key_subscript(target, key), out);
                    }
                }
            }
            Shape::Struct(_) => Self::visit_struct(table, shape, value, path, target, out),
            Shape::Scalar(_) => {}
        }
    }

    fn check_field(
        field: &Field,
        rules: &[Rule],
        shape: &Shape,
        raw: &Value,
        path: &str,
        target: &str,
        out: &mut Vec<FieldViolation>,
    ) {
        if rules.is_empty() {
            return;
        }

        // Absent non-optional scalars take their zero value.
        let zero;
        let value = match (raw, shape) {
            (Value::Null, Shape::Scalar(kind)) => {
                zero = value::scalar_zero(*kind);
                &zero
            }
            _ => raw,
        };
        let missing = match shape {
            Shape::Optional(_) | Shape::Sequence(_) | Shape::Map(_) => value.is_null(),
            _ => resmodel_core::is_zero_value(value),
        };

        for rule in rules {
            let failed = match rule {
                Rule::Required => missing,
                Rule::OmitEmpty if resmodel_core::is_zero_value(value) => return,
                Rule::OmitEmpty => false,
                _ if value.is_null() => return,
                other => !other.holds(value),
            };
            if failed {
                out.push(FieldViolation {
                    path: path.to_string(),
                    target: target.to_string(),
                    field: field.json_name().to_string(),
                    rule: rule.tag().to_string(),
                    param: rule.param(),
                    value: value.clone(),
                    description: None,
                });
                return;
            }
        }
    }
}

impl StructuralValidator for TagValidator {
    fn name(&self) -> &'static str {
        "tags"
    }

    fn validate(&self, shape: &Shape, schema: &SchemaMap, value: &Value) -> Vec<FieldViolation> {
        let table = self.rule_table(schema);
        let mut out = Vec::new();
        Self::visit_struct(&table, &shape.unwrapped(), value, "", "", &mut out);
        out
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every generated label satisfies the DNS label predicate.
        #[test]
        fn generated_labels_are_valid(label in "[a-z]([a-z0-9-]{0,61}[a-z0-9])?") {
            prop_assert!(is_dns_rfc1035_label(&label));
        }

        /// Network addresses derived by masking always validate.
        #[test]
        fn masked_networks_are_valid_cidrs(addr in any::<u32>(), prefix in 0u32..=32) {
            let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
            let net = Ipv4Addr::from(addr & mask);
            let cidr = format!("{net}/{prefix}");
            prop_assert!(is_cidrv4(&cidr));
        }
    }
}
