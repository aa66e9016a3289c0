//! Function registry.
//!
//! Expressions mention functions by [`FnId`]; the registry owns the
//! callables behind those ids. An id is allocated on first registration and
//! is the function's identity for the lifetime of the registry, so two
//! expressions invoke the same function iff they carry the same id.
//!
//! Three kinds of function exist:
//! - plain predicates, invoked by the evaluator when their expression is
//!   read without a cached result;
//! - cascading predicates, which additionally carry a setter invoked on
//!   every write whose head is the predicate;
//! - async effects, which are never evaluated synchronously and instead
//!   produce a future when started by the reactive layer.

use std::collections::HashMap;

use futures::future::LocalBoxFuture;
use lattice_foundation::{Error, ErrorKind, Expr, FnId, Result, Term, Value};

use crate::eval::Evaluator;

/// A synchronous predicate body.
///
/// Receives the evaluator (for `spy`, derivative ids, and derivative
/// writes) and the argument terms of the expression being computed.
pub type PredicateFn = fn(&mut Evaluator<'_>, &[Term]) -> Result<Value>;

/// A cascade setter body.
///
/// Invoked after a write whose head carries it, with the written expression
/// and value. May perform further writes through the evaluator.
pub type SetterFn = fn(&mut Evaluator<'_>, &Expr, &Value) -> Result<()>;

/// An asynchronous effect body.
///
/// Invoked at most once per distinct argument list by the reactive layer;
/// the returned future's resolution is fed back into the store.
pub type EffectFn = fn(&[Term]) -> LocalBoxFuture<'static, Result<Value>>;

enum FnKind {
    Predicate(PredicateFn),
    Cascading(PredicateFn, SetterFn),
    Effect(EffectFn),
}

struct FnDef {
    name: &'static str,
    kind: FnKind,
}

/// Registry of callable functions, keyed by [`FnId`].
#[derive(Default)]
pub struct Registry {
    defs: Vec<FnDef>,
    by_name: HashMap<&'static str, FnId>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plain predicate and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already registered.
    pub fn register(&mut self, name: &'static str, func: PredicateFn) -> Result<FnId> {
        self.insert(name, FnKind::Predicate(func))
    }

    /// Registers a cascading predicate: evaluable like any predicate, and
    /// carrying a setter invoked on every write headed by it.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already registered.
    pub fn register_cascading(
        &mut self,
        name: &'static str,
        func: PredicateFn,
        setter: SetterFn,
    ) -> Result<FnId> {
        self.insert(name, FnKind::Cascading(func, setter))
    }

    /// Registers an asynchronous effect function.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already registered.
    pub fn register_effect(&mut self, name: &'static str, func: EffectFn) -> Result<FnId> {
        self.insert(name, FnKind::Effect(func))
    }

    fn insert(&mut self, name: &'static str, kind: FnKind) -> Result<FnId> {
        if self.by_name.contains_key(name) {
            return Err(Error::internal(format!(
                "function already registered: {name}"
            )));
        }
        let id = FnId::new(u32::try_from(self.defs.len()).expect("function index overflow"));
        self.defs.push(FnDef { name, kind });
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Returns the name a function was registered under.
    #[must_use]
    pub fn name(&self, id: FnId) -> Option<&'static str> {
        self.defs.get(id.index() as usize).map(|d| d.name)
    }

    /// Looks up a function id by its registered name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<FnId> {
        self.by_name.get(name).copied()
    }

    /// Returns the number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns true if no functions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Resolves the synchronous body of a function.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFunction` for an unallocated id and `NotSynchronous`
    /// for an async effect.
    pub fn predicate(&self, id: FnId) -> Result<PredicateFn> {
        match self.def(id)?.kind {
            FnKind::Predicate(f) | FnKind::Cascading(f, _) => Ok(f),
            FnKind::Effect(_) => Err(Error::new(ErrorKind::NotSynchronous(id))),
        }
    }

    /// Returns the cascade setter of a function, if it carries one.
    #[must_use]
    pub fn setter(&self, id: FnId) -> Option<SetterFn> {
        match self.defs.get(id.index() as usize)?.kind {
            FnKind::Cascading(_, s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if the function carries a cascade setter.
    #[must_use]
    pub fn is_cascading(&self, id: FnId) -> bool {
        self.setter(id).is_some()
    }

    /// Resolves the asynchronous body of an effect function.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFunction` for an unallocated id and `NotAsync` for a
    /// synchronous predicate.
    pub fn effect(&self, id: FnId) -> Result<EffectFn> {
        match self.def(id)?.kind {
            FnKind::Effect(f) => Ok(f),
            _ => Err(Error::new(ErrorKind::NotAsync(id))),
        }
    }

    fn def(&self, id: FnId) -> Result<&FnDef> {
        self.defs
            .get(id.index() as usize)
            .ok_or_else(|| Error::unknown_function(id))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("functions", &self.defs.len())
            .finish()
    }
}
