//! Component Schema Registry
//!
//! Declarative field contracts for every component variant. The validator
//! walks these tables; nothing in here knows how to validate anything.
//!
//! # Field Contracts
//!
//! A contract is a list of [`FieldSpec`]s. Each field has a [`FieldKind`]
//! (scalar, enum, array, nested object, free-form record, or nested
//! component), a [`Presence`] rule, and optional numeric [`Bounds`]:
//!
//! ```text
//!   form
//!   ├── fields: Array(Object)            required
//!   │     ├── name: String               required
//!   │     ├── type: Enum(text|email|..)  default "text"
//!   │     └── required: Boolean          default false
//!   └── submitButton: Object             default {}
//!         └── text: String               default "Submit"
//! ```
//!
//! Defaults are applied when a field is absent, never when it is an explicit
//! `null`. A defaulted object (`submitButton: {}`) is itself normalized, so
//! its inner defaults are filled too.

mod builtin;

use std::collections::HashMap;

use serde_json::Value;

use crate::component::ComponentKind;

/// What to do with a number outside its bounds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundsPolicy {
    /// Pull the value back to the nearest bound
    Clamp,
    /// Fail validation
    Reject,
}

/// Inclusive numeric range
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    /// Lowest legal value
    pub min: f64,
    /// Highest legal value
    pub max: f64,
    /// Out-of-range handling
    pub policy: BoundsPolicy,
}

impl Bounds {
    /// Range whose violations are clamped
    #[must_use]
    pub fn clamp(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            policy: BoundsPolicy::Clamp,
        }
    }

    /// Range whose violations are rejected
    #[must_use]
    pub fn reject(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            policy: BoundsPolicy::Reject,
        }
    }

    /// Whether `value` lies inside the range
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Human-readable range, used in error messages
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}..={}", self.min, self.max)
    }
}

/// Shape of a field's value
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    /// JSON string
    String,
    /// Any JSON number
    Number,
    /// Whole number (`3` or `3.0`)
    Integer,
    /// JSON boolean
    Boolean,
    /// String restricted to a fixed set
    Enum(&'static [&'static str]),
    /// Array whose elements all have the given kind
    Array(Box<FieldKind>),
    /// Object with its own field contract
    Object(ObjectSchema),
    /// Object with arbitrary keys, passed through
    Record,
    /// Any JSON value, passed through
    Any,
    /// Nested component, dispatched on its own `type`
    Component,
}

impl FieldKind {
    /// Name used for `expected` in type-mismatch errors
    #[must_use]
    pub fn expected(&self) -> String {
        match self {
            Self::String => "string".to_string(),
            Self::Number => "number".to_string(),
            Self::Integer => "integer".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Enum(values) => format!("one of [{}]", values.join(", ")),
            Self::Array(element) => format!("array of {}", element.expected()),
            Self::Object(schema) => format!("{} object", schema.name),
            Self::Record => "object".to_string(),
            Self::Any => "any".to_string(),
            Self::Component => "component object".to_string(),
        }
    }
}

/// Whether a field must appear, and what happens if it does not
#[derive(Clone, Debug, PartialEq)]
pub enum Presence {
    /// Absence is a `MissingField` error
    Required,
    /// Absence (or `null`) leaves the field out
    Optional,
    /// Absence substitutes this value
    Default(Value),
}

/// Contract for one field
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    /// Wire name of the field
    pub name: &'static str,
    /// Value shape
    pub kind: FieldKind,
    /// Presence rule
    pub presence: Presence,
    /// Numeric range, for `Number` and `Integer` fields
    pub bounds: Option<Bounds>,
}

impl FieldSpec {
    /// A field that must be present
    #[must_use]
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Required,
            bounds: None,
        }
    }

    /// A field that may be omitted
    #[must_use]
    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
            bounds: None,
        }
    }

    /// A field that takes `default` when omitted
    #[must_use]
    pub fn with_default(name: &'static str, kind: FieldKind, default: Value) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Default(default),
            bounds: None,
        }
    }

    /// Attach a numeric range
    #[must_use]
    pub fn bounded(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Declared default, if any
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        match &self.presence {
            Presence::Default(value) => Some(value),
            _ => None,
        }
    }
}

/// Field contract of a nested object
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectSchema {
    /// Name used in error messages
    pub name: &'static str,
    /// Fields in declaration order
    pub fields: Vec<FieldSpec>,
}

impl ObjectSchema {
    /// Create a schema from its fields
    #[must_use]
    pub fn new(name: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self { name, fields }
    }

    /// Look up a field by wire name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Full contract of one variant (base fields excluded: `id`, `type`)
#[derive(Clone, Debug, PartialEq)]
pub struct VariantSchema {
    /// Discriminant
    pub kind: ComponentKind,
    /// Variant fields, base `title`/`hints` included
    pub fields: ObjectSchema,
}

impl VariantSchema {
    /// Fields marked required
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields
            .fields
            .iter()
            .filter(|f| matches!(f.presence, Presence::Required))
    }

    /// Fields carrying a declared default
    pub fn defaulted_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields
            .fields
            .iter()
            .filter(|f| f.default_value().is_some())
    }

    /// Whether any field (at any depth) embeds a component
    #[must_use]
    pub fn is_composite(&self) -> bool {
        fn embeds(kind: &FieldKind) -> bool {
            match kind {
                FieldKind::Component => true,
                FieldKind::Array(element) => embeds(element),
                FieldKind::Object(schema) => schema.fields.iter().any(|f| embeds(&f.kind)),
                _ => false,
            }
        }
        self.fields.fields.iter().any(|f| embeds(&f.kind))
    }
}

/// Registry of variant contracts, keyed by discriminant
#[derive(Clone, Debug)]
pub struct SchemaRegistry {
    variants: HashMap<ComponentKind, VariantSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemaRegistry {
    /// Registry with the six built-in variants
    #[must_use]
    pub fn builtin() -> Self {
        let variants = ComponentKind::ALL
            .iter()
            .map(|kind| (*kind, builtin::variant(*kind)))
            .collect();
        Self { variants }
    }

    /// Contract for a discriminant string
    #[must_use]
    pub fn contract(&self, discriminant: &str) -> Option<&VariantSchema> {
        ComponentKind::parse(discriminant).and_then(|kind| self.variants.get(&kind))
    }

    /// Contract for a known kind
    #[must_use]
    pub fn get(&self, kind: ComponentKind) -> Option<&VariantSchema> {
        self.variants.get(&kind)
    }

    /// Known discriminants, in registry order
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        ComponentKind::ALL
            .iter()
            .filter(|k| self.variants.contains_key(*k))
            .map(ComponentKind::as_str)
            .collect()
    }
}
