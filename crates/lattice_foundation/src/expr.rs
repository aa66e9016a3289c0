//! Canonical expressions.
//!
//! An expression is a finite ordered sequence of terms. The head term is the
//! *predicate*: a function identity makes the expression evaluable, anything
//! else makes it a pure data key. Expressions are the cache keys of the
//! entire system, so they are value-equatable and hashable.

use std::fmt;

use crate::collections::LatVec;
use crate::term::Term;

/// A canonical, value-equatable, hashable ordered sequence of terms.
///
/// Every public entry point of the system normalises its input into this
/// form before any lookup, so two element-wise equal term sequences are a
/// single cache key. Cloning is O(1).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Expr {
    terms: LatVec<Term>,
}

impl Default for Expr {
    fn default() -> Self {
        Self {
            terms: LatVec::new(),
        }
    }
}

impl Expr {
    /// Creates an expression from an ordered sequence of terms.
    #[must_use]
    pub fn from_terms(terms: impl IntoIterator<Item = Term>) -> Self {
        Self {
            terms: terms.into_iter().collect(),
        }
    }

    /// Returns the head term (the predicate), if any.
    #[must_use]
    pub fn head(&self) -> Option<&Term> {
        self.terms.first()
    }

    /// Returns an iterator over the argument terms (everything after the head).
    pub fn args(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter().skip(1)
    }

    /// Returns an iterator over all terms.
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter()
    }

    /// Gets a term by position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Term> {
        self.terms.get(index)
    }

    /// Returns the number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns true if the expression has no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns a new expression with the given head prepended to this one.
    ///
    /// Used to splice a whole expression into the argument position of a
    /// wrapping predicate, e.g. a readiness probe around an arbitrary
    /// expression.
    #[must_use]
    pub fn prepend(&self, head: Term) -> Self {
        Self {
            terms: self.terms.push_front(head),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{term:?}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{term}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<Term>> for Expr {
    fn from(terms: Vec<Term>) -> Self {
        Self::from_terms(terms)
    }
}

impl From<&[Term]> for Expr {
    fn from(terms: &[Term]) -> Self {
        Self::from_terms(terms.iter().cloned())
    }
}

impl<const N: usize> From<[Term; N]> for Expr {
    fn from(terms: [Term; N]) -> Self {
        Self::from_terms(terms)
    }
}

impl FromIterator<Term> for Expr {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        Self::from_terms(iter)
    }
}
