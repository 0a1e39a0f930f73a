//! Validation errors.
//!
//! Every error carries a machine-readable [`ValidationErrorKind`] and the
//! path of the offending field (`sections[2].component.fields[0].name`), so a
//! renderer can show a fallback and the agent can retry with corrected input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Machine-readable error kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationErrorKind {
    /// Input is not a structured value
    MalformedInput,
    /// `type` missing or unrecognized
    UnknownVariant,
    /// Required field absent
    MissingField,
    /// Field present with the wrong kind or out of range
    FieldTypeMismatch,
    /// Composite nesting beyond the configured bound
    MaxDepthExceeded,
    /// Nested component reuses an ancestor's id
    AncestorIdCycle,
}

impl ValidationErrorKind {
    /// Wire name, as serialized
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedInput => "malformedInput",
            Self::UnknownVariant => "unknownVariant",
            Self::MissingField => "missingField",
            Self::FieldTypeMismatch => "fieldTypeMismatch",
            Self::MaxDepthExceeded => "maxDepthExceeded",
            Self::AncestorIdCycle => "ancestorIdCycle",
        }
    }
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MalformedInput => "MalformedInput",
            Self::UnknownVariant => "UnknownVariant",
            Self::MissingField => "MissingField",
            Self::FieldTypeMismatch => "FieldTypeMismatch",
            Self::MaxDepthExceeded => "MaxDepthExceeded",
            Self::AncestorIdCycle => "AncestorIdCycle",
        };
        f.write_str(name)
    }
}

/// Errors produced by the validator
///
/// `path` is empty for the top-level object.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Input could not be parsed, or is not a JSON object
    #[error("malformed input{}: {message}", position(.line, .column))]
    MalformedInput {
        /// Parser or shape message
        message: String,
        /// 1-based line (0 when not from the parser)
        line: usize,
        /// 1-based column (0 when not from the parser)
        column: usize,
    },

    /// Discriminant absent or not in the registry
    #[error("unknown variant {}{}", describe_found(.found.as_deref()), at(.path))]
    UnknownVariant {
        /// Location of the component
        path: String,
        /// Offending discriminant, `None` if absent
        found: Option<String>,
    },

    /// Required field absent with no default
    #[error("missing required field `{field}`{}", at(.path))]
    MissingField {
        /// Full path of the missing field
        path: String,
        /// Field name
        field: String,
    },

    /// Value has the wrong kind, violates an enum, or is out of range
    #[error("field `{field}`{}: expected {expected}, found {actual}", at(.path))]
    FieldTypeMismatch {
        /// Full path of the field
        path: String,
        /// Field name
        field: String,
        /// What the contract wants
        expected: String,
        /// What the input had
        actual: String,
    },

    /// Component nesting deeper than the configured limit
    #[error("component nesting exceeds {limit} levels{}", at(.path))]
    MaxDepthExceeded {
        /// Location of the component that crossed the limit
        path: String,
        /// Configured limit
        limit: usize,
    },

    /// Nested component id equals an ancestor's id
    #[error("component id {id:?} repeats an ancestor id{}", at(.path))]
    AncestorIdCycle {
        /// Location of the nested component
        path: String,
        /// Repeated id
        id: String,
    },
}

fn describe_found(found: Option<&str>) -> String {
    found.map_or_else(|| "(missing `type`)".to_string(), |v| format!("{v:?}"))
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn position(line: &usize, column: &usize) -> String {
    if *line == 0 {
        String::new()
    } else {
        format!(" at line {line}, column {column}")
    }
}

fn at(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" at {path}")
    }
}

impl ValidationError {
    /// Build a `MalformedInput` from a JSON parser error
    #[must_use]
    pub fn from_parser(err: &serde_json::Error) -> Self {
        Self::MalformedInput {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }

    /// Build a `MalformedInput` that did not come from the parser
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
            line: 0,
            column: 0,
        }
    }

    /// Machine-readable kind
    #[must_use]
    pub fn kind(&self) -> ValidationErrorKind {
        match self {
            Self::MalformedInput { .. } => ValidationErrorKind::MalformedInput,
            Self::UnknownVariant { .. } => ValidationErrorKind::UnknownVariant,
            Self::MissingField { .. } => ValidationErrorKind::MissingField,
            Self::FieldTypeMismatch { .. } => ValidationErrorKind::FieldTypeMismatch,
            Self::MaxDepthExceeded { .. } => ValidationErrorKind::MaxDepthExceeded,
            Self::AncestorIdCycle { .. } => ValidationErrorKind::AncestorIdCycle,
        }
    }

    /// Path of the offending location (empty for the root or for parse errors)
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::MalformedInput { .. } => "",
            Self::UnknownVariant { path, .. }
            | Self::MissingField { path, .. }
            | Self::FieldTypeMismatch { path, .. }
            | Self::MaxDepthExceeded { path, .. }
            | Self::AncestorIdCycle { path, .. } => path,
        }
    }
}
