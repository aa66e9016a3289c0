//! The persistent expression store.
//!
//! A `Store` maps expressions to their captured results and maintains two
//! exact-inverse dependency indices over them. It is purely data: writing,
//! invalidating, and edge recording are the only operations, and all of
//! them return a new store sharing structure with the old one. Evaluation
//! lives a layer up.
//!
//! The indices obey, at every externally observable store:
//! - `f ∈ dependents[e]` iff `e ∈ contributors[f]`;
//! - an expression absent from the cache has no contributor edges;
//! - writing an expression removes every entry that transitively consulted
//!   it, with the transitive closure taken before any deletion.

use std::collections::VecDeque;

use lattice_foundation::{Error, Expr, LatMap, LatSet, Value};

use crate::cell::ResultCell;

/// Persistent map of expressions to results plus the bidirectional
/// dependency index.
///
/// Clone is O(1) due to structural sharing. All mutation methods return a
/// new `Store` instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Store {
    /// Captured results by expression.
    cache: LatMap<Expr, ResultCell>,
    /// For each cached expression, the expressions it consulted during its
    /// most recent evaluation.
    contributors: LatMap<Expr, LatSet<Expr>>,
    /// Exact inverse of `contributors`.
    dependents: LatMap<Expr, LatSet<Expr>>,
}

impl Store {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cached expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if no expressions are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Returns true if the expression has a cached result.
    #[must_use]
    pub fn contains(&self, expr: &Expr) -> bool {
        self.cache.contains_key(expr)
    }

    /// Returns the cached result cell for an expression, if present.
    #[must_use]
    pub fn cached(&self, expr: &Expr) -> Option<&ResultCell> {
        self.cache.get(expr)
    }

    /// Returns the expressions this expression consulted during its most
    /// recent evaluation. Empty when it consulted nothing or is not cached.
    #[must_use]
    pub fn contributors_of(&self, expr: &Expr) -> LatSet<Expr> {
        self.contributors.get(expr).cloned().unwrap_or_default()
    }

    /// Returns the expressions whose cached results consulted this one.
    #[must_use]
    pub fn dependents_of(&self, expr: &Expr) -> LatSet<Expr> {
        self.dependents.get(expr).cloned().unwrap_or_default()
    }

    /// Iterates the cached expressions.
    pub fn exprs(&self) -> impl Iterator<Item = &Expr> {
        self.cache.keys()
    }

    /// Iterates the contributor index entries.
    pub fn contributor_entries(&self) -> impl Iterator<Item = (&Expr, &LatSet<Expr>)> {
        self.contributors.iter()
    }

    /// Iterates the dependent index entries.
    pub fn dependent_entries(&self) -> impl Iterator<Item = (&Expr, &LatSet<Expr>)> {
        self.dependents.iter()
    }

    /// Computes `dependents*(expr) ∪ {expr}`: every expression whose cached
    /// result would become stale if `expr` changed.
    ///
    /// The closure is taken over the current index by breadth-first search
    /// before any deletion, so the result is complete and independent of
    /// removal order.
    #[must_use]
    pub fn affected_of(&self, expr: &Expr) -> LatSet<Expr> {
        let mut affected = LatSet::unit(expr.clone());
        let mut queue = VecDeque::new();
        queue.push_back(expr.clone());

        while let Some(current) = queue.pop_front() {
            if let Some(deps) = self.dependents.get(&current) {
                for dep in deps.iter() {
                    if !affected.contains(dep) {
                        affected = affected.insert(dep.clone());
                        queue.push_back(dep.clone());
                    }
                }
            }
        }

        affected
    }

    /// Writes a result cell for an expression.
    ///
    /// Every affected expression (the dependents closure of `expr`, plus
    /// `expr` itself) is removed from the cache and stripped of its
    /// contributor edges before the new cell is inserted. Returns the new
    /// store and the affected set.
    #[must_use]
    pub fn with_result(&self, expr: &Expr, cell: ResultCell) -> (Self, LatSet<Expr>) {
        let affected = self.affected_of(expr);
        let mut next = self.without_affected(&affected);

        tracing::trace!(expr = %expr, affected = affected.len(), "store write");

        next.cache = next.cache.insert(expr.clone(), cell);
        (next, affected)
    }

    /// Writes a successful value, discarding the affected set.
    #[must_use]
    pub fn with_value(&self, expr: &Expr, value: Value) -> Self {
        self.with_result(expr, ResultCell::Value(value)).0
    }

    /// Writes a captured failure, discarding the affected set.
    #[must_use]
    pub fn with_thrown(&self, expr: &Expr, error: Error) -> Self {
        self.with_result(expr, ResultCell::Thrown(error)).0
    }

    /// Removes an expression and its dependents closure without writing a
    /// replacement cell. Returns the new store and the affected set.
    #[must_use]
    pub fn invalidate(&self, expr: &Expr) -> (Self, LatSet<Expr>) {
        let affected = self.affected_of(expr);
        let next = self.without_affected(&affected);

        tracing::trace!(expr = %expr, affected = affected.len(), "store invalidate");

        (next, affected)
    }

    /// Records a dependency edge: `dependent` consulted `contributor`.
    ///
    /// Updates both indices so they remain exact inverses.
    #[must_use]
    pub fn with_edge(&self, dependent: &Expr, contributor: &Expr) -> Self {
        let contribs = self.contributors_of(dependent).insert(contributor.clone());
        let deps = self.dependents_of(contributor).insert(dependent.clone());

        Self {
            cache: self.cache.clone(),
            contributors: self.contributors.insert(dependent.clone(), contribs),
            dependents: self.dependents.insert(contributor.clone(), deps),
        }
    }

    /// Removes every affected expression from the cache and clears its
    /// outgoing contributor edges, symmetrically shrinking the dependent
    /// buckets of the expressions it consulted.
    fn without_affected(&self, affected: &LatSet<Expr>) -> Self {
        let mut cache = self.cache.clone();
        let mut contributors = self.contributors.clone();
        let mut dependents = self.dependents.clone();

        for expr in affected.iter() {
            cache = cache.remove(expr);

            if let Some(contribs) = self.contributors.get(expr) {
                for contributor in contribs.iter() {
                    if let Some(bucket) = dependents.get(contributor) {
                        let shrunk = bucket.remove(expr);
                        dependents = if shrunk.is_empty() {
                            dependents.remove(contributor)
                        } else {
                            dependents.insert(contributor.clone(), shrunk)
                        };
                    }
                }
            }
            contributors = contributors.remove(expr);
        }

        Self {
            cache,
            contributors,
            dependents,
        }
    }
}
