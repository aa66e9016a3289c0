//! The on-demand evaluator.
//!
//! An `Evaluator` wraps a store-in-progress together with the re-entrant
//! context of a single synchronous computation: the stack of expressions
//! currently being computed (for recursion detection), the innermost one
//! (for dependency and derivative bookkeeping), and the affected-set
//! accumulator of the current write. The context is scoped to the
//! evaluator, not the persistent store; `finish` commits the new store and
//! the accumulated affected set.

use lattice_foundation::{DerivativeId, Error, Expr, FnId, LatSet, Result, Term, Value};
use lattice_store::{ResultCell, Store};

use crate::registry::Registry;

/// Evaluates expressions against a working store.
///
/// Predicates receive the evaluator and read other expressions through
/// [`Evaluator::spy`], which is the only read that records a dependency
/// edge. A plain [`Evaluator::get`] inside a predicate would leave the
/// indices blind to the read.
pub struct Evaluator<'a> {
    store: Store,
    registry: &'a Registry,
    /// Expressions currently being computed, innermost last.
    computing: Vec<Expr>,
    /// The innermost expression being computed, if any.
    deepest: Option<Expr>,
    /// Affected set accumulated across the writes of this evaluator,
    /// cascade consequences included.
    affected: LatSet<Expr>,
    /// True while a cascade setter is running somewhere up the stack.
    in_cascade: bool,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator over the given store and registry.
    #[must_use]
    pub fn new(store: Store, registry: &'a Registry) -> Self {
        Self {
            store,
            registry,
            computing: Vec::new(),
            deepest: None,
            affected: LatSet::new(),
            in_cascade: false,
        }
    }

    /// Returns the working store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the innermost expression currently being computed.
    #[must_use]
    pub fn deepest(&self) -> Option<&Expr> {
        self.deepest.as_ref()
    }

    /// Commits the evaluator: the new store and the affected set
    /// accumulated by its writes.
    #[must_use]
    pub fn finish(self) -> (Store, LatSet<Expr>) {
        (self.store, self.affected)
    }

    /// Resolves an expression's value.
    ///
    /// A cached cell replays its outcome. An uncached function-headed
    /// expression is evaluated and its outcome captured. An uncached data
    /// expression mentioning a derivative id first runs the id's creator
    /// (discarding its result) so the creator can publish the cell, then
    /// serves whatever is cached, `Nil` if nothing.
    ///
    /// # Errors
    ///
    /// Re-raises a captured failure, raises `RecursiveComputation` when the
    /// expression is already being computed, and propagates registry misuse.
    pub fn get(&mut self, expr: &Expr) -> Result<Value> {
        if let Some(cell) = self.store.cached(expr) {
            return cell.to_result();
        }
        match expr.head() {
            Some(&Term::Fn(id)) => self.evaluate(expr, id),
            _ => self.materialize(expr),
        }
    }

    /// Resolves an expression's value and records the read as a dependency
    /// of the innermost computation.
    ///
    /// The edge is recorded for successful reads and for replayed cached
    /// failures; an engine-misuse error unwinds without touching the
    /// indices.
    ///
    /// # Errors
    ///
    /// Same contract as [`Evaluator::get`].
    pub fn spy(&mut self, expr: &Expr) -> Result<Value> {
        let reader = self.deepest.clone();
        let result = self.get(expr);

        let trackable = match &result {
            Ok(_) => true,
            Err(err) => err.is_cacheable(),
        };
        if trackable {
            if let Some(reader) = reader {
                self.store = self.store.with_edge(&reader, expr);
            }
        }

        result
    }

    /// Writes a value, invalidating the expression's dependents closure and
    /// running the cascade protocol when the head is a cascading predicate.
    ///
    /// # Errors
    ///
    /// Propagates a failure raised by a cascade setter. The writes the
    /// setter completed before failing remain committed.
    pub fn set(&mut self, expr: &Expr, value: Value) -> Result<()> {
        let (store, affected) = self
            .store
            .with_result(expr, ResultCell::Value(value.clone()));
        self.store = store;
        self.affected = self.affected.union(&affected);

        let Some(setter) = expr
            .head()
            .and_then(Term::as_fn)
            .and_then(|id| self.registry.setter(id))
        else {
            return Ok(());
        };

        // Consequences run after the write's own invalidation, attributed
        // to the cascading expression. The outermost cascade owns the
        // accumulator; nested setters contribute to it.
        tracing::trace!(expr = %expr, "cascade");
        let outermost = !self.in_cascade;
        self.in_cascade = true;
        let saved = self.deepest.replace(expr.clone());
        let outcome = setter(self, expr, &value);
        self.deepest = saved;
        if outermost {
            self.in_cascade = false;
        }
        outcome
    }

    /// Writes a captured failure, invalidating like [`Evaluator::set`].
    /// No cascade runs for thrown cells.
    pub fn set_thrown(&mut self, expr: &Expr, error: Error) {
        let (store, affected) = self.store.with_result(expr, ResultCell::Thrown(error));
        self.store = store;
        self.affected = self.affected.union(&affected);
    }

    /// Applies a function to the expression's current value (which may
    /// evaluate) and writes the result back.
    ///
    /// # Errors
    ///
    /// Propagates a failed read of the current value or a failed write.
    pub fn modify(&mut self, expr: &Expr, f: impl FnOnce(Value) -> Value) -> Result<()> {
        let current = self.get(expr)?;
        self.set(expr, f(current))
    }

    /// Mints a derivative id owned by the innermost computation.
    ///
    /// # Errors
    ///
    /// Returns `DerivativeOutsideComputation` when no computation is in
    /// flight.
    pub fn derivative_id(&self, key: Term) -> Result<DerivativeId> {
        let creator = self
            .deepest
            .clone()
            .ok_or_else(|| Error::derivative_outside_computation("derivative_id"))?;
        Ok(DerivativeId::new(creator, key))
    }

    /// Publishes an auxiliary cache entry owned by the innermost
    /// computation.
    ///
    /// The written expression is recorded as a dependent of its creator, so
    /// invalidating the creator invalidates every derivative it published.
    ///
    /// # Errors
    ///
    /// Returns `DerivativeOutsideComputation` when no computation is in
    /// flight.
    pub fn set_derivative(&mut self, expr: &Expr, value: Value) -> Result<()> {
        let creator = self
            .deepest
            .clone()
            .ok_or_else(|| Error::derivative_outside_computation("set_derivative"))?;

        let (store, affected) = self.store.with_result(expr, ResultCell::Value(value));
        self.store = store;
        self.affected = self.affected.union(&affected);
        self.store = self.store.with_edge(expr, &creator);
        Ok(())
    }

    /// Runs a predicate and captures its outcome.
    fn evaluate(&mut self, expr: &Expr, id: FnId) -> Result<Value> {
        if self.computing.contains(expr) {
            return Err(Error::recursive(expr.clone()));
        }
        let func = self.registry.predicate(id)?;

        tracing::trace!(expr = %expr, "evaluate");
        self.computing.push(expr.clone());
        let saved = self.deepest.replace(expr.clone());
        let args: Vec<Term> = expr.args().cloned().collect();

        let outcome = func(self, &args);

        self.deepest = saved;
        self.computing.pop();

        match outcome {
            Ok(value) => {
                self.record(expr, ResultCell::Value(value.clone()));
                Ok(value)
            }
            Err(err) if err.is_cacheable() => {
                self.record(expr, ResultCell::Thrown(err.clone()));
                Err(err)
            }
            // Engine-misuse errors unwind without a cell, so a later read
            // re-evaluates. Edges recorded by the frame's earlier spies are
            // cleared with it: an uncached expression has no contributors.
            Err(err) => {
                let (store, _) = self.store.invalidate(expr);
                self.store = store;
                Err(err)
            }
        }
    }

    /// Serves an uncached data expression, running derivative creators
    /// first so they can publish the cell.
    fn materialize(&mut self, expr: &Expr) -> Result<Value> {
        let creators: Vec<Expr> = expr
            .terms()
            .filter_map(Term::as_derivative)
            .map(|d| d.creator().clone())
            .filter(|creator| !self.store.contains(creator))
            .collect();

        for creator in &creators {
            // The creator runs for its publication side effects only.
            let _ = self.get(creator);
        }

        self.store
            .cached(expr)
            .map_or(Ok(Value::Nil), ResultCell::to_result)
    }

    /// Captures a completed computation's cell. Nothing cached can depend
    /// on a just-computed expression, so the affected set is just itself.
    fn record(&mut self, expr: &Expr, cell: ResultCell) {
        let (store, _) = self.store.with_result(expr, cell);
        self.store = store;
    }
}
