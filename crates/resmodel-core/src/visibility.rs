//! # Field Visibility
//!
//! Each field path of a resource type carries a set of [`VisibilityFlags`]
//! naming the request kinds that may observe or set it:
//!
//! | Flags | Meaning |
//! |-------|---------|
//! | `READ` | rendered in responses |
//! | `READ \| CREATE` | settable on create, immutable afterwards |
//! | `READ \| CREATE \| UPDATE` | freely mutable |
//! | empty ([`VisibilityFlags::SKIP`]) | composite node; only its leaves are checked |
//!
//! Two option bits ride along: `CASE_INSENSITIVE` (string comparisons ignore
//! case when detecting a change) and `NULLABLE` (computed: the field sits
//! behind an optional/sequence/map wrapper and is updatable, so an update
//! may clear it).
//!
//! ## Consistency Contract
//!
//! A [`VisibilityMap`] must cover its type's [`SchemaMap`] exactly: every
//! path present, composite paths mapped to `SKIP`, leaf paths mapped to a
//! non-empty access set. [`VisibilityMap::check_consistency`] reports every
//! deviation.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{ContractError, ContractViolation, ContractViolations};
use crate::path;
use crate::schema::SchemaMap;

bitflags! {
    /// Visibility bit set for one field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VisibilityFlags: u8 {
        const READ = 1 << 0;
        const CREATE = 1 << 1;
        const UPDATE = 1 << 2;

        // option flags
        const CASE_INSENSITIVE = 1 << 3;
        const NULLABLE = 1 << 4;

        const DEFAULT = Self::READ.bits() | Self::CREATE.bits() | Self::UPDATE.bits();
    }
}

impl VisibilityFlags {
    /// Sentinel for composite nodes.
    pub const SKIP: Self = Self::empty();

    /// Parse a space-separated tag value such as `"read create nocase"`.
    ///
    /// `path` is only used for error reporting.
    pub fn parse(path: &str, words: &str) -> Result<Self, ContractError> {
        let mut flags = Self::empty();
        for word in words.split_whitespace() {
            flags |= match word.to_ascii_lowercase().as_str() {
                "read" => Self::READ,
                "create" => Self::CREATE,
                "update" => Self::UPDATE,
                "nocase" => Self::CASE_INSENSITIVE,
                _ => {
                    return Err(ContractError::UnknownVisibilityWord {
                        path: path.to_string(),
                        word: word.to_string(),
                    })
                }
            };
        }
        Ok(flags)
    }

    /// Only the access bits (read/create/update).
    pub fn access(self) -> Self {
        self & Self::DEFAULT
    }

    pub fn is_skip(self) -> bool {
        self.access().is_empty()
    }

    pub fn read_only(self) -> bool {
        self.access() == Self::READ
    }

    pub fn can_read(self) -> bool {
        self.contains(Self::READ)
    }

    pub fn can_create(self) -> bool {
        self.contains(Self::CREATE)
    }

    pub fn can_update(self) -> bool {
        self.contains(Self::UPDATE)
    }

    pub fn case_insensitive(self) -> bool {
        self.contains(Self::CASE_INSENSITIVE)
    }

    pub fn is_nullable(self) -> bool {
        self.contains(Self::NULLABLE)
    }

    /// True if these flags admit the given request kind.
    pub fn allows(self, kind: RequestKind) -> bool {
        self.contains(kind.flag())
    }
}

impl fmt::Display for VisibilityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("skip");
        }
        let words = [
            (Self::READ, "read"),
            (Self::CREATE, "create"),
            (Self::UPDATE, "update"),
            (Self::CASE_INSENSITIVE, "nocase"),
            (Self::NULLABLE, "nullable"),
        ];
        let mut first = true;
        for (flag, word) in words {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(word)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// The kind of request a field is being checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Read,
    Create,
    Update,
}

impl RequestKind {
    pub fn flag(self) -> VisibilityFlags {
        match self {
            Self::Read => VisibilityFlags::READ,
            Self::Create => VisibilityFlags::CREATE,
            Self::Update => VisibilityFlags::UPDATE,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
        })
    }
}

/// Canonical field path → visibility flags for one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityMap(BTreeMap<String, VisibilityFlags>);

impl VisibilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a map from the `visibility` tags recorded in a Schema Map.
    ///
    /// - Composite paths map to [`VisibilityFlags::SKIP`].
    /// - A leaf takes its own tag if it has one, otherwise the tag of its
    ///   nearest tagged ancestor, otherwise [`VisibilityFlags::DEFAULT`].
    /// - Updatable leaves gain [`VisibilityFlags::NULLABLE`] when the leaf
    ///   itself or any ancestor sits behind a wrapper.
    pub fn from_schema(schema: &SchemaMap) -> Result<Self, ContractError> {
        let mut map = Self::new();
        for (p, info) in schema.iter() {
            if !info.is_leaf() {
                // Validate the tag even though composites are skipped.
                if let Some(words) = info.tag.visibility {
                    VisibilityFlags::parse(p, words)?;
                }
                map.insert(p, VisibilityFlags::SKIP);
                continue;
            }

            let mut flags = match info.tag.visibility {
                Some(words) => VisibilityFlags::parse(p, words)?,
                None => inherited_flags(schema, p)?,
            };
            if flags.can_update() && behind_wrapper(schema, p, info.wrapped) {
                flags |= VisibilityFlags::NULLABLE;
            }
            map.insert(p, flags);
        }
        Ok(map)
    }

    pub fn insert(&mut self, path: impl Into<String>, flags: VisibilityFlags) -> Option<VisibilityFlags> {
        self.0.insert(path.into(), flags)
    }

    /// Builder-style insert, handy for hand-written declarations.
    pub fn with(mut self, path: impl Into<String>, flags: VisibilityFlags) -> Self {
        self.insert(path, flags);
        self
    }

    pub fn get(&self, path: &str) -> Option<VisibilityFlags> {
        self.0.get(path).copied()
    }

    /// Flags for `path`, or `SKIP` if the path is not declared.
    pub fn flags(&self, path: &str) -> VisibilityFlags {
        self.get(path).unwrap_or(VisibilityFlags::SKIP)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, VisibilityFlags)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Verify this map against the type's Schema Map.
    ///
    /// Every violation is collected; the result is `Ok` only when there are none.
    pub fn check_consistency(&self, schema: &SchemaMap) -> Result<(), ContractError> {
        let mut violations = Vec::new();

        for (p, info) in schema.iter() {
            match (self.get(p), info.is_leaf()) {
                (None, _) => violations.push(ContractViolation::MissingPath(p.to_string())),
                (Some(flags), true) if flags.is_skip() => {
                    violations.push(ContractViolation::LeafSkipped(p.to_string()))
                }
                (Some(flags), false) if !flags.is_empty() => {
                    violations.push(ContractViolation::CompositeNotSkipped {
                        path: p.to_string(),
                        flags: flags.to_string(),
                    })
                }
                _ => {}
            }
        }

        for p in self.paths() {
            if !schema.contains(p) {
                violations.push(ContractViolation::StalePath(p.to_string()));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ContractError::Inconsistent {
                type_name: schema.type_name().to_string(),
                violations: ContractViolations::new(violations),
            })
        }
    }
}

impl<P: Into<String>> FromIterator<(P, VisibilityFlags)> for VisibilityMap {
    fn from_iter<I: IntoIterator<Item = (P, VisibilityFlags)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(p, f)| (p.into(), f)).collect())
    }
}

fn behind_wrapper(schema: &SchemaMap, leaf: &str, leaf_wrapped: bool) -> bool {
    leaf_wrapped
        || path::ancestors(leaf).any(|a| schema.get(a).is_some_and(|i| i.wrapped))
}

fn inherited_flags(schema: &SchemaMap, leaf: &str) -> Result<VisibilityFlags, ContractError> {
    for ancestor in path::ancestors(leaf) {
        if let Some(words) = schema.get(ancestor).and_then(|i| i.tag.visibility) {
            return VisibilityFlags::parse(ancestor, words);
        }
    }
    Ok(VisibilityFlags::DEFAULT)
}
