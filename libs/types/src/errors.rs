//! Error taxonomy for the order-book engine
//!
//! Every boundary operation returns a `Result` carrying a kind from the
//! taxonomy. Model validation does not stop at the first failure: all field
//! errors of one entity are collected into a single `Error::Invalid` value.

use std::fmt;
use thiserror::Error;

/// Result type used across the engine crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds. These classify errors for callers; the display text carries
/// the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Requested entity does not exist
    NotFound,
    /// Unique index violation
    Duplicate,
    /// Stored bytes cannot be interpreted as the expected model
    TypeMismatch,
    /// Missing or unsupported schema metadata
    Metadata,
    /// Required value is absent
    Empty,
    /// Malformed input value
    Input,
    /// Model-level invariant violation
    Model,
    /// Operation not allowed in the current state
    State,
    /// Invalid ticker or ticker mismatch
    Currency,
    /// Arithmetic left the storable range
    Overflow,
    /// Missing authorization
    Unauthorized,
    /// Monetary value unusable for the operation
    Amount,
    /// Underlying store failure
    Database,
    /// Explicitly stubbed-out path; must never surface in production
    Human,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::Metadata => "metadata",
            ErrorKind::Empty => "empty",
            ErrorKind::Input => "invalid input",
            ErrorKind::Model => "invalid model",
            ErrorKind::State => "invalid state",
            ErrorKind::Currency => "invalid currency",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Amount => "invalid amount",
            ErrorKind::Database => "database",
            ErrorKind::Human => "not implemented",
        };
        f.write_str(name)
    }
}

/// A single failure annotated with the field that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.field, self.kind, self.message)
    }
}

/// Engine error: either a single operational failure or a validation
/// aggregate over the fields of one entity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("{kind}: {message}")]
    Failure { kind: ErrorKind, message: String },

    #[error("invalid model: {}", join_fields(.0))]
    Invalid(Vec<FieldError>),
}

fn join_fields(fields: &[FieldError]) -> String {
    let parts: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    parts.join("; ")
}

impl Error {
    /// Create a single failure of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Classify this error. Aggregates classify as `Model`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Failure { kind, .. } => *kind,
            Error::Invalid(_) => ErrorKind::Model,
        }
    }

    /// Check whether this error, or any field failure inside an aggregate,
    /// has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        match self {
            Error::Failure { kind: k, .. } => *k == kind,
            Error::Invalid(fields) => {
                kind == ErrorKind::Model || fields.iter().any(|f| f.kind == kind)
            }
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Duplicate, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Unauthorized, message)
    }

    pub fn state(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::State, message)
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Overflow, message)
    }

    /// Prefix the failure message with caller context, keeping the kind.
    /// Aggregates pass through unchanged.
    pub fn context(self, context: &str) -> Self {
        match self {
            Error::Failure { kind, message } => Error::Failure {
                kind,
                message: format!("{}: {}", context, message),
            },
            invalid => invalid,
        }
    }
}

/// Collects every field failure of a single entity before surfacing them
/// together.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure for `field`.
    pub fn push(&mut self, field: &str, kind: ErrorKind, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            kind,
            message: message.into(),
        });
    }

    /// Fold the outcome of a nested validation into this aggregate. Nested
    /// aggregates are flattened with a dotted field prefix.
    pub fn append(&mut self, field: &str, result: Result<()>) {
        match result {
            Ok(()) => {}
            Err(Error::Failure { kind, message }) => self.push(field, kind, message),
            Err(Error::Invalid(nested)) => {
                for inner in nested {
                    self.0.push(FieldError {
                        field: format!("{}.{}", field, inner.field),
                        kind: inner.kind,
                        message: inner.message,
                    });
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert the collected failures into a result.
    pub fn finish(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::Invalid(self.0))
        }
    }
}
