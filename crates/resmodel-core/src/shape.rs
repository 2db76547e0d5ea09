//! # Structural Type Descriptors
//!
//! A [`Shape`] is a compile-time description of a Rust type as seen on the
//! wire: a scalar, a wrapper around another shape (optional, sequence, or
//! string-keyed map), or a struct with an ordered list of [`Field`]s.
//!
//! Resource types implement [`Reflect`] by hand. Scalar and container impls
//! for the standard types live here, so a resource struct only lists its own
//! fields:
//!
//! ```
//! use resmodel_core::{shape_of, Field, Reflect, Shape};
//!
//! struct Version {
//!     id: String,
//!     channel_group: Option<String>,
//! }
//!
//! impl Reflect for Version {
//!     fn shape() -> Shape {
//!         Shape::structure(
//!             "Version",
//!             vec![
//!                 Field::named("ID", shape_of::<String>).json("id"),
//!                 Field::named("ChannelGroup", shape_of::<Option<String>>)
//!                     .json("channelGroup")
//!                     .validate("required"),
//!             ],
//!         )
//!     }
//! }
//! ```
//!
//! Field names are the canonical (struct-side) names used in Schema Map
//! keys. The `json` tag carries the wire name used in error targets.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

/// Deferred shape constructor. Using function pointers keeps descriptors
/// cheap to build and lets a struct refer to types declared after it.
pub type ShapeFn = fn() -> Shape;

/// Kinds of scalar leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Bool,
    Integer,
    Unsigned,
    Float,
    Timestamp,
}

/// The structural shape of a type.
#[derive(Debug, Clone)]
pub enum Shape {
    /// A leaf value with no structural fields.
    Scalar(ScalarKind),
    /// A nullable wrapper (`Option<T>`).
    Optional(ShapeFn),
    /// An ordered sequence (`Vec<T>`).
    Sequence(ShapeFn),
    /// A string-keyed mapping (`BTreeMap<String, T>`, `HashMap<String, T>`).
    Map(ShapeFn),
    /// A struct with named and embedded fields.
    Struct(StructShape),
}

impl Shape {
    /// Build a struct shape.
    pub fn structure(name: &'static str, fields: Vec<Field>) -> Self {
        Self::Struct(StructShape {
            name,
            id: None,
            fields,
        })
    }

    /// Type identity of the unwrapped struct, if it was obtained through
    /// [`shape_of`].
    pub fn type_id(&self) -> Option<TypeId> {
        match self.unwrapped() {
            Self::Struct(s) => s.id,
            _ => None,
        }
    }

    /// True for optional, sequence and map wrappers.
    pub fn is_wrapper(&self) -> bool {
        matches!(self, Self::Optional(_) | Self::Sequence(_) | Self::Map(_))
    }

    /// Strip every wrapper layer and return the element shape.
    pub fn unwrapped(&self) -> Shape {
        let mut current = self.clone();
        loop {
            match current {
                Self::Optional(inner) | Self::Sequence(inner) | Self::Map(inner) => {
                    current = inner();
                }
                other => return other,
            }
        }
    }

    /// True when the unwrapped shape is a struct with at least one exported
    /// field. Structs without exported fields behave like scalars.
    pub fn is_composite(&self) -> bool {
        match self.unwrapped() {
            Self::Struct(s) => s.fields.iter().any(|f| f.exported),
            _ => false,
        }
    }
}

/// A struct description: its name and fields in declaration order.
///
/// `id` is stamped by [`shape_of`]; declared names are not unique, so
/// anything that needs type identity must go through it.
#[derive(Debug, Clone)]
pub struct StructShape {
    pub name: &'static str,
    pub id: Option<TypeId>,
    pub fields: Vec<Field>,
}

impl StructShape {
    pub fn key(&self) -> StructKey {
        StructKey {
            id: self.id,
            name: self.name,
        }
    }
}

/// Identity of a struct shape, used by recursion guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructKey {
    id: Option<TypeId>,
    name: &'static str,
}

impl StructKey {
    /// Same type. Falls back to the declared name only when either side
    /// was built without [`shape_of`].
    pub fn matches(&self, other: &StructKey) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.name == other.name,
        }
    }

    /// True if an enclosing frame of `stack` is the same type.
    pub fn is_in(&self, stack: &[StructKey]) -> bool {
        stack.iter().any(|k| k.matches(self))
    }
}

/// Declared metadata for one field.
///
/// - `json`: the wire name (falls back to the field name when absent).
/// - `validate`: comma-separated structural rules, e.g. `"required,max=63"`.
/// - `visibility`: space-separated visibility words, e.g. `"read create"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldTag {
    pub json: Option<&'static str>,
    pub validate: Option<&'static str>,
    pub visibility: Option<&'static str>,
}

impl FieldTag {
    pub const fn new() -> Self {
        Self {
            json: None,
            validate: None,
            visibility: None,
        }
    }

    pub const fn json(self, name: &'static str) -> Self {
        Self {
            json: Some(name),
            ..self
        }
    }

    pub const fn validate(self, rules: &'static str) -> Self {
        Self {
            validate: Some(rules),
            ..self
        }
    }

    pub const fn visibility(self, words: &'static str) -> Self {
        Self {
            visibility: Some(words),
            ..self
        }
    }

    /// The comma-separated `validate` rules, trimmed, empty entries dropped.
    pub fn rules(&self) -> impl Iterator<Item = &'static str> {
        self.validate
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// One field of a struct shape.
#[derive(Debug, Clone)]
pub struct Field {
    /// Canonical field name.
    pub name: &'static str,
    /// Declared metadata.
    pub tag: FieldTag,
    /// Embedded fields contribute their sub-fields to the parent path.
    pub embedded: bool,
    /// Unexported fields carry no wire contract and are never indexed.
    pub exported: bool,
    /// The field's own shape.
    pub shape: ShapeFn,
}

impl Field {
    /// An exported, named field.
    pub fn named(name: &'static str, shape: ShapeFn) -> Self {
        Self {
            name,
            tag: FieldTag::new(),
            embedded: false,
            exported: true,
            shape,
        }
    }

    /// An embedded (composed) field, e.g. a `#[serde(flatten)]` envelope.
    pub fn embedded(name: &'static str, shape: ShapeFn) -> Self {
        Self {
            embedded: true,
            ..Self::named(name, shape)
        }
    }

    /// An internal field that never appears on the wire.
    pub fn private(name: &'static str, shape: ShapeFn) -> Self {
        Self {
            exported: false,
            ..Self::named(name, shape)
        }
    }

    pub fn json(mut self, name: &'static str) -> Self {
        self.tag = self.tag.json(name);
        self
    }

    pub fn validate(mut self, rules: &'static str) -> Self {
        self.tag = self.tag.validate(rules);
        self
    }

    pub fn visibility(mut self, words: &'static str) -> Self {
        self.tag = self.tag.visibility(words);
        self
    }

    /// Wire name for this field.
    pub fn json_name(&self) -> &'static str {
        self.tag.json.unwrap_or(self.name)
    }
}

/// Types that can describe their own structural shape.
pub trait Reflect: 'static {
    fn shape() -> Shape;
}

/// Shape constructor for `T`, usable as a [`ShapeFn`]. Struct shapes come
/// back stamped with `T`'s [`TypeId`].
pub fn shape_of<T: Reflect>() -> Shape {
    match T::shape() {
        Shape::Struct(mut s) => {
            s.id = Some(TypeId::of::<T>());
            Shape::Struct(s)
        }
        other => other,
    }
}

macro_rules! scalar_reflect {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn shape() -> Shape {
                    Shape::Scalar(ScalarKind::$kind)
                }
            }
        )*
    };
}

scalar_reflect! {
    String => String,
    bool => Bool,
    i32 => Integer,
    i64 => Integer,
    u8 => Unsigned,
    u16 => Unsigned,
    u32 => Unsigned,
    u64 => Unsigned,
    f64 => Float,
    DateTime<Utc> => Timestamp,
}

impl<T: Reflect> Reflect for Option<T> {
    fn shape() -> Shape {
        Shape::Optional(shape_of::<T>)
    }
}

impl<T: Reflect> Reflect for Box<T> {
    fn shape() -> Shape {
        shape_of::<T>()
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn shape() -> Shape {
        Shape::Sequence(shape_of::<T>)
    }
}

impl<T: Reflect> Reflect for BTreeMap<String, T> {
    fn shape() -> Shape {
        Shape::Map(shape_of::<T>)
    }
}

impl<T: Reflect> Reflect for HashMap<String, T> {
    fn shape() -> Shape {
        Shape::Map(shape_of::<T>)
    }
}
