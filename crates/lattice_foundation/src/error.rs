//! Error types for the Lattice system.
//!
//! Uses `thiserror` for ergonomic error definition. Errors are `Clone`
//! because a failed predicate's error is captured into the store cell that
//! would otherwise hold its value, and re-raised on every subsequent read.

use thiserror::Error;

use crate::expr::Expr;
use crate::intern::FnId;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Lattice operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a recursive-computation error.
    #[must_use]
    pub fn recursive(expr: Expr) -> Self {
        Self::new(ErrorKind::RecursiveComputation(expr))
    }

    /// Creates an async-call-incomplete error carrying the call expression.
    #[must_use]
    pub fn async_incomplete(call: Expr) -> Self {
        Self::new(ErrorKind::AsyncIncomplete(call))
    }

    /// Creates a derivative-misuse error for the named operation.
    #[must_use]
    pub fn derivative_outside_computation(operation: &'static str) -> Self {
        Self::new(ErrorKind::DerivativeOutsideComputation(operation))
    }

    /// Creates an unknown-function error.
    #[must_use]
    pub fn unknown_function(id: FnId) -> Self {
        Self::new(ErrorKind::UnknownFunction(id))
    }

    /// Creates a user predicate failure.
    #[must_use]
    pub fn predicate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Predicate(message.into()))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns true if this error is captured into a store cell when a
    /// predicate raises it.
    ///
    /// User failures and the async-incomplete sentinel participate in
    /// invalidation like values; engine-misuse errors surface to the caller
    /// without touching the cache.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.kind.is_cacheable()
    }

    /// Returns true if this is the async-incomplete sentinel.
    #[must_use]
    pub fn is_async_incomplete(&self) -> bool {
        matches!(self.kind, ErrorKind::AsyncIncomplete(_))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// An expression's evaluation reached itself again.
    #[error("recursive computation of {0}")]
    RecursiveComputation(Expr),

    /// The targeted async effect call has not completed.
    ///
    /// Carries the call expression `(fn, args…)` so a waiter can start it.
    #[error("async call incomplete: {0}")]
    AsyncIncomplete(Expr),

    /// A derivative operation was invoked with no computation in flight.
    #[error("{0} called outside of an in-flight computation")]
    DerivativeOutsideComputation(&'static str),

    /// A function id is not present in the registry.
    #[error("unknown function: {0:?}")]
    UnknownFunction(FnId),

    /// An async effect was used where a synchronous predicate is required.
    #[error("function is not synchronously evaluable: {0:?}")]
    NotSynchronous(FnId),

    /// A synchronous predicate was used where an async effect is required.
    #[error("function is not an async effect: {0:?}")]
    NotAsync(FnId),

    /// Failure raised by a user predicate.
    #[error("predicate failure: {0}")]
    Predicate(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// Returns true if a predicate raising this kind has the error captured
    /// into its result cell.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Predicate(_) | Self::AsyncIncomplete(_))
    }
}
