//! Error types for plan derivation.

use thiserror::Error;

use crate::types::CompareOp;

/// Top-level error type for plan derivation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedError),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

/// The predicate requests a capability the target store cannot express.
///
/// Never retried; planning fails fast and the error reaches the caller
/// unmodified.
#[derive(Debug, Error)]
pub enum UnsupportedError {
    #[error("case insensitive matching is not supported")]
    IgnoreCase,

    #[error("operator {0:?} is not representable in the store's comparison model")]
    Operator(CompareOp),

    #[error("cannot sort by '{property}': the derived access path orders by '{ordered_by}'")]
    SortMismatch { property: String, ordered_by: String },

    #[error("cannot sort by '{property}': the derived plan is a {plan} and carries no order")]
    SortWithoutQuery { property: String, plan: &'static str },
}

/// A runtime argument is structurally invalid for the clause it binds.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("null value bound for property '{0}': conditions on null parameters are not supported")]
    NullValue(String),

    #[error("empty collection bound for membership test on '{0}'")]
    EmptyCollection(String),

    #[error("membership test on '{0}' requires a collection or array argument")]
    NotACollection(String),

    #[error("ran out of bound arguments while translating condition on '{0}'")]
    MissingArgument(String),

    #[error("counting requires a key-bounded query unless scan counting is explicitly enabled")]
    ScanCountDisabled,
}

/// A generated filter expression failed to parse or evaluate.
#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("malformed filter expression: {0}")]
    Parse(String),

    #[error("unresolved placeholder '{0}' in filter expression")]
    UnknownPlaceholder(String),

    #[error("placeholder '{0}' is bound by parameter name and has no value")]
    DeferredValue(String),
}

pub type Result<T> = std::result::Result<T, Error>;
