//! Declarative validation of command arguments.
//!
//! A schema lists the fields a command accepts and the JSON kind each must
//! have. Values are never coerced: the string `"42"` does not satisfy a
//! number rule.

use serde_json::{Map, Value};
use strum::Display;
use thiserror::Error;

/// JSON value kinds a field rule can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A JSON number without a fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
    /// Any value, including `null`.
    Any,
}

impl ValueKind {
    fn admits(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }
}

/// Reasons an argument object fails its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A required field is absent.
    #[error("\"{field}\" is required")]
    Missing {
        /// Field name.
        field: String,
    },
    /// A field has the wrong JSON kind.
    #[error("\"{field}\" must be {expected}")]
    WrongKind {
        /// Field name.
        field: String,
        /// Kind the rule requires.
        expected: KindName,
    },
    /// A field is not declared and the schema is closed.
    #[error("\"{field}\" is not allowed")]
    Unknown {
        /// Field name.
        field: String,
    },
}

/// Article-qualified kind name used in validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindName(ValueKind);

impl std::fmt::Display for KindName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            ValueKind::Any => f.write_str("any value"),
            ValueKind::Integer | ValueKind::Object | ValueKind::Array => {
                write!(f, "an {}", self.0)
            }
            kind => write!(f, "a {kind}"),
        }
    }
}

#[derive(Debug, Clone)]
struct FieldRule {
    name: String,
    kind: ValueKind,
    required: bool,
}

/// Accepted shape of a command's `args` object.
#[derive(Debug, Clone, Default)]
pub struct ArgsSchema {
    fields: Vec<FieldRule>,
    closed: bool,
}

impl ArgsSchema {
    /// An open schema with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `name` to be present with the given kind.
    #[must_use]
    pub fn required(self, name: &str, kind: ValueKind) -> Self {
        self.rule(name, kind, true)
    }

    /// Allows `name`; when present it must have the given kind.
    #[must_use]
    pub fn optional(self, name: &str, kind: ValueKind) -> Self {
        self.rule(name, kind, false)
    }

    /// Rejects fields that have no rule.
    #[must_use]
    pub const fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    fn rule(mut self, name: &str, kind: ValueKind, required: bool) -> Self {
        self.fields.push(FieldRule {
            name: name.to_owned(),
            kind,
            required,
        });
        self
    }

    /// Checks `args` against the schema, reporting the first violation.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] describing the first failing field.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), SchemaError> {
        for rule in &self.fields {
            match args.get(&rule.name) {
                None if rule.required => {
                    return Err(SchemaError::Missing {
                        field: rule.name.clone(),
                    });
                }
                Some(value) if !rule.kind.admits(value) => {
                    return Err(SchemaError::WrongKind {
                        field: rule.name.clone(),
                        expected: KindName(rule.kind),
                    });
                }
                _ => {}
            }
        }

        if self.closed {
            if let Some(field) = args
                .keys()
                .find(|key| !self.fields.iter().any(|rule| &rule.name == *key))
            {
                return Err(SchemaError::Unknown {
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }
}
