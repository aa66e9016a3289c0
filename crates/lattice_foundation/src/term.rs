//! Expression terms.
//!
//! A term is one element of an expression's ordered sequence: a primitive,
//! an interned tag, a function identity, or a derivative id tying the term
//! to the computation that created it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::expr::Expr;
use crate::intern::{FnId, TagId};
use crate::value::Value;

/// One element of an expression.
///
/// Terms are immutable and cheaply cloneable. Two terms are equal iff they
/// are structurally equal; floats compare by bit pattern so that equality is
/// reflexive and consistent with hashing.
#[derive(Clone)]
pub enum Term {
    /// The nil term (represents absence).
    Nil,
    /// Boolean term.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// String term.
    Str(Arc<str>),
    /// Interned opaque tag.
    Tag(TagId),
    /// Function identity (the head of an evaluable expression).
    Fn(FnId),
    /// Derivative id owned by another expression's computation.
    Derivative(DerivativeId),
}

/// An identity pair tagging expressions owned by another computation.
///
/// The `creator` is the expression whose evaluation minted this id; the
/// `key` distinguishes multiple derivatives of the same creator. A new
/// evaluation of the creator mints fresh ids, so expressions keyed by an
/// old id die with the generation that published them.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DerivativeId {
    creator: Arc<Expr>,
    key: Arc<Term>,
}

impl DerivativeId {
    /// Creates a derivative id for the given creator expression and key.
    #[must_use]
    pub fn new(creator: Expr, key: Term) -> Self {
        Self {
            creator: Arc::new(creator),
            key: Arc::new(key),
        }
    }

    /// Returns the expression whose computation created this id.
    #[must_use]
    pub fn creator(&self) -> &Expr {
        &self.creator
    }

    /// Returns the unique key of this id.
    #[must_use]
    pub fn key(&self) -> &Term {
        &self.key
    }
}

impl fmt::Debug for DerivativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivativeId({:?} of {:?})", self.key, self.creator)
    }
}

impl Term {
    /// Returns true if this term is nil.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Returns true if this term is a function identity.
    #[must_use]
    pub const fn is_fn(&self) -> bool {
        matches!(self, Self::Fn(_))
    }

    /// Attempts to extract a function identity.
    #[must_use]
    pub const fn as_fn(&self) -> Option<FnId> {
        match self {
            Self::Fn(id) => Some(*id),
            _ => None,
        }
    }

    /// Attempts to extract a tag id.
    #[must_use]
    pub const fn as_tag(&self) -> Option<TagId> {
        match self {
            Self::Tag(id) => Some(*id),
            _ => None,
        }
    }

    /// Attempts to extract an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract a derivative id.
    #[must_use]
    pub const fn as_derivative(&self) -> Option<&DerivativeId> {
        match self {
            Self::Derivative(d) => Some(d),
            _ => None,
        }
    }

    /// Converts this term to a value, when it denotes one.
    ///
    /// Function identities and derivative ids are cache-key material, not
    /// values, and return `None`.
    #[must_use]
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Nil => Some(Value::Nil),
            Self::Bool(b) => Some(Value::Bool(*b)),
            Self::Int(n) => Some(Value::Int(*n)),
            Self::Float(n) => Some(Value::Float(*n)),
            Self::Str(s) => Some(Value::Str(Arc::clone(s))),
            Self::Tag(id) => Some(Value::Tag(*id)),
            Self::Fn(_) | Self::Derivative(_) => None,
        }
    }
}

// Implement PartialEq manually to handle float comparison
impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Tag(a), Self::Tag(b)) => a == b,
            (Self::Fn(a), Self::Fn(b)) => a == b,
            (Self::Derivative(a), Self::Derivative(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Nil => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(n) => n.hash(state),
            Self::Float(n) => n.to_bits().hash(state),
            Self::Str(s) => s.hash(state),
            Self::Tag(id) => id.hash(state),
            Self::Fn(id) => id.hash(state),
            Self::Derivative(d) => d.hash(state),
        }
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Tag(id) => write!(f, "{id:?}"),
            Self::Fn(id) => write!(f, "{id:?}"),
            Self::Derivative(d) => write!(f, "{d:?}"),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

// Convenience From implementations

impl From<bool> for Term {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Term {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Term {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Self::Str(s.into())
    }
}

impl From<TagId> for Term {
    fn from(id: TagId) -> Self {
        Self::Tag(id)
    }
}

impl From<FnId> for Term {
    fn from(id: FnId) -> Self {
        Self::Fn(id)
    }
}

impl From<DerivativeId> for Term {
    fn from(id: DerivativeId) -> Self {
        Self::Derivative(id)
    }
}
