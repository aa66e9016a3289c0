//! The async bridge.
//!
//! External asynchronous computations are lifted into the expression world
//! through three reserved-tag bookkeeping expressions keyed by the call:
//!
//! - `(async/status, fn, args…)` — `executing` or `complete`;
//! - `(async/result, fn, args…)` — the resolved value (or captured error);
//! - `(async/promise, fn, args…)` — the key of the memoised run.
//!
//! Four ordinary predicates sit on top and are therefore cacheable
//! expressions themselves, invalidated exactly when the bookkeeping cells
//! they spy are rewritten.

use lattice_engine::{Evaluator, Registry};
use lattice_foundation::{Error, Expr, FnId, Result, TagId, Term, Value};

/// Function ids of the installed bridge predicates.
#[derive(Clone, Copy, Debug)]
pub struct AsyncBridge {
    call_status: FnId,
    call_result: FnId,
    result_is_ready: FnId,
    spy_effect_result: FnId,
}

impl AsyncBridge {
    /// Registers the bridge predicates and returns their ids.
    ///
    /// # Errors
    ///
    /// Returns an error if any bridge predicate name is already taken.
    pub fn install(registry: &mut Registry) -> Result<Self> {
        Ok(Self {
            call_status: registry.register("async-call-status", call_status)?,
            call_result: registry.register("async-call-result", call_result)?,
            result_is_ready: registry.register("result-is-ready", result_is_ready)?,
            spy_effect_result: registry.register("spy-async-effect-result", spy_effect_result)?,
        })
    }

    /// Id of the `async-call-status` predicate.
    #[must_use]
    pub fn call_status(&self) -> FnId {
        self.call_status
    }

    /// Id of the `async-call-result` predicate.
    #[must_use]
    pub fn call_result(&self) -> FnId {
        self.call_result
    }

    /// Id of the `result-is-ready` predicate.
    #[must_use]
    pub fn result_is_ready(&self) -> FnId {
        self.result_is_ready
    }

    /// Id of the `spy-async-effect-result` predicate.
    #[must_use]
    pub fn spy_effect_result(&self) -> FnId {
        self.spy_effect_result
    }

    /// The status bookkeeping expression of a call.
    #[must_use]
    pub fn status_expr(f: FnId, args: &[Term]) -> Expr {
        tagged_expr(TagId::STATUS, f, args)
    }

    /// The result bookkeeping expression of a call.
    #[must_use]
    pub fn result_expr(f: FnId, args: &[Term]) -> Expr {
        tagged_expr(TagId::RESULT, f, args)
    }

    /// The memoised-run key of a call.
    #[must_use]
    pub fn promise_expr(f: FnId, args: &[Term]) -> Expr {
        tagged_expr(TagId::PROMISE, f, args)
    }

    /// The call expression `(fn, args…)` identifying an effect invocation.
    #[must_use]
    pub fn call_expr(f: FnId, args: &[Term]) -> Expr {
        Expr::from_terms(std::iter::once(Term::Fn(f)).chain(args.iter().cloned()))
    }

    /// Wraps an expression in a readiness probe: `[result-is-ready, expr…]`.
    #[must_use]
    pub fn readiness_expr(&self, target: &Expr) -> Expr {
        target.prepend(Term::Fn(self.result_is_ready))
    }

    /// Builds `[spy-async-effect-result, fn, args…]`, the cacheable view of
    /// an effect call's result.
    #[must_use]
    pub fn effect_result_expr(&self, f: FnId, args: &[Term]) -> Expr {
        Self::call_expr(f, args).prepend(Term::Fn(self.spy_effect_result))
    }

    /// Builds `[async-call-status, fn, args…]`.
    #[must_use]
    pub fn status_probe_expr(&self, f: FnId, args: &[Term]) -> Expr {
        Self::call_expr(f, args).prepend(Term::Fn(self.call_status))
    }

    /// Builds `[async-call-result, fn, args…]`.
    #[must_use]
    pub fn result_probe_expr(&self, f: FnId, args: &[Term]) -> Expr {
        Self::call_expr(f, args).prepend(Term::Fn(self.call_result))
    }
}

fn tagged_expr(tag: TagId, f: FnId, args: &[Term]) -> Expr {
    Expr::from_terms(
        std::iter::once(Term::Tag(tag))
            .chain(std::iter::once(Term::Fn(f)))
            .chain(args.iter().cloned()),
    )
}

/// Prefixes the call terms of a bridge predicate's argument list with a
/// bookkeeping tag.
fn cell_of(tag: TagId, call: &[Term]) -> Expr {
    Expr::from_terms(std::iter::once(Term::Tag(tag)).chain(call.iter().cloned()))
}

/// `async-call-status`: the stored status, or `async/not-started` when the
/// call has no status cell yet.
fn call_status(ev: &mut Evaluator<'_>, args: &[Term]) -> Result<Value> {
    let status = ev.spy(&cell_of(TagId::STATUS, args))?;
    if status.is_nil() {
        Ok(Value::Tag(TagId::NOT_STARTED))
    } else {
        Ok(status)
    }
}

/// `async-call-result`: the resolved value, `nil` while absent.
fn call_result(ev: &mut Evaluator<'_>, args: &[Term]) -> Result<Value> {
    ev.spy(&cell_of(TagId::RESULT, args))
}

/// `result-is-ready`: false iff waiting on an incomplete async call.
///
/// A successful read and a non-async failure are both "ready": neither will
/// change by waiting, so the waiter should observe them now.
fn result_is_ready(ev: &mut Evaluator<'_>, args: &[Term]) -> Result<Value> {
    let inner = Expr::from_terms(args.iter().cloned());
    match ev.spy(&inner) {
        Err(err) if err.is_async_incomplete() => Ok(Value::Bool(false)),
        _ => Ok(Value::Bool(true)),
    }
}

/// `spy-async-effect-result`: the call's result once complete, otherwise
/// the `AsyncIncomplete` sentinel carrying the call expression.
fn spy_effect_result(ev: &mut Evaluator<'_>, args: &[Term]) -> Result<Value> {
    let status = ev.spy(&cell_of(TagId::STATUS, args))?;
    if status.as_tag() == Some(TagId::COMPLETE) {
        ev.spy(&cell_of(TagId::RESULT, args))
    } else {
        Err(Error::async_incomplete(Expr::from_terms(
            args.iter().cloned(),
        )))
    }
}
