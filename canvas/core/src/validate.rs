//! Validator / Normalizer
//!
//! Turns untrusted tool output (JSON text or an already-parsed value) into a
//! typed [`ComponentDescription`], walking the contracts in the
//! [`SchemaRegistry`].
//!
//! # Algorithm
//!
//! ```text
//!   raw text ──parse──▶ Value ──▶ read `type` ──▶ registry contract
//!                                                     │
//!            ┌────────────────────────────────────────┘
//!            ▼
//!   for each field:  absent + required   → MissingField
//!                    absent + default    → substitute, then normalize it
//!                    present             → check kind / enum / bounds
//!                    nested component    → recurse (depth + 1)
//!            │
//!            ▼
//!   normalized Value ──serde──▶ ComponentDescription
//! ```
//!
//! Validation is pure: no I/O, no shared state, and the same input always
//! yields the same output, including the derived `id` for inputs that lack
//! one. Unknown keys are dropped.

use std::fmt;
use std::io;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::component::{ComponentDescription, ComponentKind};
use crate::error::{ValidationError, ValidationResult};
use crate::schema::{Bounds, BoundsPolicy, FieldKind, FieldSpec, ObjectSchema, Presence, SchemaRegistry};

/// Limits applied to every validation
///
/// These bound the work a single hostile payload can cause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationLimits {
    /// Maximum component nesting, counting the top-level component as 1 (default: 32)
    pub max_depth: usize,
    /// Maximum input size in bytes (default: 1MB)
    ///
    /// Text is measured as given; an already-parsed value is measured by its
    /// compact JSON encoding.
    pub max_input_bytes: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_input_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Untyped input accepted by the validator
#[derive(Clone, Copy, Debug)]
pub enum RawInput<'a> {
    /// JSON text, parsed first
    Text(&'a str),
    /// Already-parsed JSON
    Value(&'a Value),
}

impl<'a> From<&'a str> for RawInput<'a> {
    fn from(text: &'a str) -> Self {
        Self::Text(text)
    }
}

impl<'a> From<&'a String> for RawInput<'a> {
    fn from(text: &'a String) -> Self {
        Self::Text(text)
    }
}

impl<'a> From<&'a Value> for RawInput<'a> {
    fn from(value: &'a Value) -> Self {
        Self::Value(value)
    }
}

/// Schema-driven validator
///
/// Cheap to clone; the registry is shared.
#[derive(Clone, Debug)]
pub struct Validator {
    registry: Arc<SchemaRegistry>,
    limits: ValidationLimits,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Arc::new(SchemaRegistry::builtin()), ValidationLimits::default())
    }
}

impl Validator {
    /// Create a validator over a registry
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>, limits: ValidationLimits) -> Self {
        Self { registry, limits }
    }

    /// Built-in registry with custom limits
    #[must_use]
    pub fn with_limits(limits: ValidationLimits) -> Self {
        Self::new(Arc::new(SchemaRegistry::builtin()), limits)
    }

    /// Current limits
    #[must_use]
    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Registry in use
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate raw input into a typed description
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] met while walking the input.
    pub fn validate<'a>(
        &self,
        raw: impl Into<RawInput<'a>>,
    ) -> ValidationResult<ComponentDescription> {
        let normalized = self.normalize(raw)?;
        serde_json::from_value(normalized).map_err(|e| {
            ValidationError::malformed(format!("normalized component has no typed form: {e}"))
        })
    }

    /// Validate raw input and return the normalized JSON
    ///
    /// This is the defaults-applied object before it is converted to
    /// [`ComponentDescription`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] met while walking the input.
    pub fn normalize<'a>(&self, raw: impl Into<RawInput<'a>>) -> ValidationResult<Value> {
        let parsed;
        let value = match raw.into() {
            RawInput::Text(text) => {
                self.check_size(text.len())?;
                parsed = serde_json::from_str::<Value>(text)
                    .map_err(|e| ValidationError::from_parser(&e))?;
                &parsed
            }
            RawInput::Value(value) => {
                self.check_size(encoded_len(value))?;
                value
            }
        };

        if !value.is_object() {
            return Err(ValidationError::malformed(format!(
                "expected a JSON object, found {}",
                json_kind(value)
            )));
        }

        let mut walk = Walk {
            registry: &self.registry,
            max_depth: self.limits.max_depth,
            path: FieldPath::default(),
            ancestors: Vec::new(),
        };
        walk.component(value, 1)
    }

    fn check_size(&self, len: usize) -> ValidationResult<()> {
        if len > self.limits.max_input_bytes {
            return Err(ValidationError::malformed(format!(
                "input too large: {len} bytes (max: {})",
                self.limits.max_input_bytes
            )));
        }
        Ok(())
    }
}

/// Location inside the input, rendered as `sections[2].component.fields[0]`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<Seg>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Seg {
    Key(&'static str),
    Index(usize),
}

impl FieldPath {
    fn push_key(&mut self, key: &'static str) {
        self.0.push(Seg::Key(key));
    }

    fn push_index(&mut self, index: usize) {
        self.0.push(Seg::Index(index));
    }

    fn pop(&mut self) {
        self.0.pop();
    }

    /// Whether this is the top-level location
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                Seg::Key(key) if i == 0 => write!(f, "{key}")?,
                Seg::Key(key) => write!(f, ".{key}")?,
                Seg::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// One traversal of an input tree
struct Walk<'r> {
    registry: &'r SchemaRegistry,
    max_depth: usize,
    path: FieldPath,
    /// Ids of the components enclosing the current position
    ancestors: Vec<String>,
}

impl Walk<'_> {
    fn component(&mut self, value: &Value, depth: usize) -> ValidationResult<Value> {
        if depth > self.max_depth {
            return Err(ValidationError::MaxDepthExceeded {
                path: self.path.to_string(),
                limit: self.max_depth,
            });
        }

        let Some(obj) = value.as_object() else {
            return Err(ValidationError::malformed(format!(
                "expected a component object, found {}",
                json_kind(value)
            )));
        };

        let registry = self.registry;
        let schema = match obj.get("type") {
            Some(Value::String(tag)) => {
                registry
                    .contract(tag)
                    .ok_or_else(|| ValidationError::UnknownVariant {
                        path: self.path.to_string(),
                        found: Some(tag.clone()),
                    })?
            }
            Some(other) => {
                return Err(ValidationError::UnknownVariant {
                    path: self.path.to_string(),
                    found: Some(other.to_string()),
                })
            }
            None => {
                return Err(ValidationError::UnknownVariant {
                    path: self.path.to_string(),
                    found: None,
                })
            }
        };

        let id = match obj.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            None | Some(Value::Null) => derive_id(schema.kind, obj),
            Some(other) => {
                self.path.push_key("id");
                let err = self.mismatch("id", "non-empty string".to_string(), other);
                self.path.pop();
                return Err(err);
            }
        };

        if self.ancestors.contains(&id) {
            return Err(ValidationError::AncestorIdCycle {
                path: self.path.to_string(),
                id,
            });
        }

        self.ancestors.push(id.clone());
        let fields = self.object(&schema.fields, obj, depth);
        self.ancestors.pop();

        let mut out = fields?;
        out.insert("id".to_string(), Value::String(id));
        out.insert(
            "type".to_string(),
            Value::String(schema.kind.as_str().to_string()),
        );
        Ok(Value::Object(out))
    }

    fn object(
        &mut self,
        schema: &ObjectSchema,
        obj: &Map<String, Value>,
        depth: usize,
    ) -> ValidationResult<Map<String, Value>> {
        let mut out = Map::new();
        for spec in &schema.fields {
            self.path.push_key(spec.name);
            let result = self.field(spec, obj.get(spec.name), depth);
            self.path.pop();
            if let Some(value) = result? {
                out.insert(spec.name.to_string(), value);
            }
        }

        for key in obj.keys() {
            if schema.field(key).is_none() && key != "id" && key != "type" {
                tracing::trace!(
                    key = %key,
                    schema = schema.name,
                    path = %self.path,
                    "Dropping unknown field"
                );
            }
        }

        Ok(out)
    }

    fn field(
        &mut self,
        spec: &FieldSpec,
        value: Option<&Value>,
        depth: usize,
    ) -> ValidationResult<Option<Value>> {
        match (value, &spec.presence) {
            (None, Presence::Required) => Err(ValidationError::MissingField {
                path: self.path.to_string(),
                field: spec.name.to_string(),
            }),
            (None | Some(Value::Null), Presence::Optional) => Ok(None),
            (None, Presence::Default(default)) => self
                .value(spec.name, &spec.kind, spec.bounds, default, depth)
                .map(Some),
            (Some(value), _) => self
                .value(spec.name, &spec.kind, spec.bounds, value, depth)
                .map(Some),
        }
    }

    fn value(
        &mut self,
        field: &str,
        kind: &FieldKind,
        bounds: Option<Bounds>,
        value: &Value,
        depth: usize,
    ) -> ValidationResult<Value> {
        match kind {
            FieldKind::String if value.is_string() => Ok(value.clone()),
            FieldKind::Boolean if value.is_boolean() => Ok(value.clone()),
            FieldKind::Number => {
                let Some(n) = value.as_f64() else {
                    return Err(self.mismatch(field, kind.expected(), value));
                };
                match self.bounded(field, kind, n, bounds)? {
                    Some(clamped) => Ok(Value::from(clamped)),
                    None => Ok(value.clone()),
                }
            }
            FieldKind::Integer => {
                let Some(n) = as_integer(value) else {
                    return Err(self.mismatch(field, kind.expected(), value));
                };
                #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
                let n = match self.bounded(field, kind, n as f64, bounds)? {
                    Some(clamped) => clamped as i64,
                    None => n,
                };
                Ok(Value::from(n))
            }
            FieldKind::Enum(values) => match value.as_str() {
                Some(s) if values.contains(&s) => Ok(value.clone()),
                Some(s) => Err(ValidationError::FieldTypeMismatch {
                    path: self.path.to_string(),
                    field: field.to_string(),
                    expected: kind.expected(),
                    actual: format!("{s:?}"),
                }),
                None => Err(self.mismatch(field, kind.expected(), value)),
            },
            FieldKind::Array(element) => {
                let Some(items) = value.as_array() else {
                    return Err(self.mismatch(field, kind.expected(), value));
                };
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    self.path.push_index(index);
                    let result = self.value(field, element, bounds, item, depth);
                    self.path.pop();
                    out.push(result?);
                }
                Ok(Value::Array(out))
            }
            FieldKind::Object(schema) => match value.as_object() {
                Some(obj) => self.object(schema, obj, depth).map(Value::Object),
                None => Err(self.mismatch(field, kind.expected(), value)),
            },
            FieldKind::Record if value.is_object() => Ok(value.clone()),
            FieldKind::Any => Ok(value.clone()),
            FieldKind::Component if value.is_object() => self.component(value, depth + 1),
            FieldKind::String | FieldKind::Boolean | FieldKind::Record | FieldKind::Component => {
                Err(self.mismatch(field, kind.expected(), value))
            }
        }
    }

    /// Apply bounds; `Some` carries a clamped replacement
    fn bounded(
        &self,
        field: &str,
        kind: &FieldKind,
        n: f64,
        bounds: Option<Bounds>,
    ) -> ValidationResult<Option<f64>> {
        match bounds {
            Some(b) if !b.contains(n) => match b.policy {
                BoundsPolicy::Clamp => Ok(Some(n.clamp(b.min, b.max))),
                BoundsPolicy::Reject => Err(ValidationError::FieldTypeMismatch {
                    path: self.path.to_string(),
                    field: field.to_string(),
                    expected: format!("{} in {}", kind.expected(), b.describe()),
                    actual: n.to_string(),
                }),
            },
            _ => Ok(None),
        }
    }

    fn mismatch(&self, field: &str, expected: String, actual: &Value) -> ValidationError {
        ValidationError::FieldTypeMismatch {
            path: self.path.to_string(),
            field: field.to_string(),
            expected,
            actual: json_kind(actual).to_string(),
        }
    }
}

/// Integer view of a JSON number, accepting `3.0` but not `3.5`
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
/// Length of `value` as compact JSON, without building the string
fn encoded_len(value: &Value) -> usize {
    struct Counter(usize);

    impl io::Write for Counter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0 += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let mut counter = Counter(0);
    serde_json::to_writer(&mut counter, value).map_or(usize::MAX, |()| counter.0)
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if value.is_u64() {
        // Larger than i64::MAX; no field accepts that
        return None;
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

/// Name of a JSON value's kind, as reported in `actual`
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(s) if s.trim().is_empty() => "empty string",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Stable id for a component that arrived without one
///
/// Keys of `serde_json::Map` serialize in sorted order, so equal objects
/// always hash equal.
fn derive_id(kind: ComponentKind, obj: &Map<String, Value>) -> String {
    let canonical = serde_json::to_vec(obj).unwrap_or_default();
    format!("{}-{:08x}", kind.as_str(), crc32fast::hash(&canonical))
}
