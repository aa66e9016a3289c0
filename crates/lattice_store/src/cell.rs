//! Result cells.
//!
//! A cell captures the outcome of a completed computation, successful or
//! not. Thrown failures live in the same cell position as values so that
//! they participate in invalidation identically.

use lattice_foundation::{Error, Result, Value};

/// The captured outcome of evaluating or writing an expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultCell {
    /// The computation returned a value.
    Value(Value),
    /// The computation raised an error.
    Thrown(Error),
}

impl ResultCell {
    /// Returns the contained value, if this cell holds one.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Thrown(_) => None,
        }
    }

    /// Returns the captured error, if this cell holds one.
    #[must_use]
    pub const fn thrown(&self) -> Option<&Error> {
        match self {
            Self::Value(_) => None,
            Self::Thrown(e) => Some(e),
        }
    }

    /// Returns true if this cell captured a failure.
    #[must_use]
    pub const fn is_thrown(&self) -> bool {
        matches!(self, Self::Thrown(_))
    }

    /// Replays the captured outcome: the value on success, the re-raised
    /// error otherwise.
    ///
    /// # Errors
    ///
    /// Returns the captured error when the cell holds a thrown failure.
    pub fn to_result(&self) -> Result<Value> {
        match self {
            Self::Value(v) => Ok(v.clone()),
            Self::Thrown(e) => Err(e.clone()),
        }
    }
}

impl From<Value> for ResultCell {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<Error> for ResultCell {
    fn from(e: Error) -> Self {
        Self::Thrown(e)
    }
}
