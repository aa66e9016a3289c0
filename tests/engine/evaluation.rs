//! Integration tests for cache-first evaluation and dependency recording.

use std::cell::Cell;

use lattice_engine::{Evaluator, Registry};
use lattice_foundation::{Error, ErrorKind, Expr, FnId, Result, Term, Value};
use lattice_store::Store;

fn base() -> Expr {
    Expr::from(vec![Term::from("base")])
}

thread_local! {
    static DOUBLE_RUNS: Cell<usize> = const { Cell::new(0) };
    static FAIL_RUNS: Cell<usize> = const { Cell::new(0) };
}

fn double(ev: &mut Evaluator<'_>, _args: &[Term]) -> Result<Value> {
    DOUBLE_RUNS.with(|c| c.set(c.get() + 1));
    let v = ev
        .spy(&base())?
        .as_int()
        .ok_or_else(|| Error::predicate("expected an int"))?;
    Ok(Value::Int(v * 2))
}

fn failing(_ev: &mut Evaluator<'_>, _args: &[Term]) -> Result<Value> {
    FAIL_RUNS.with(|c| c.set(c.get() + 1));
    Err(Error::predicate("always fails"))
}

fn double_registry() -> (Registry, Expr) {
    let mut registry = Registry::new();
    let id = registry.register("double", double).unwrap();
    (registry, Expr::from(vec![Term::Fn(id)]))
}

// =============================================================================
// Memoisation
// =============================================================================

#[test]
fn evaluation_runs_once_per_cache_generation() {
    let (registry, double_e) = double_registry();
    let mut ev = Evaluator::new(Store::new(), &registry);
    ev.set(&base(), Value::Int(10)).unwrap();

    assert_eq!(ev.get(&double_e).unwrap(), Value::Int(20));
    assert_eq!(ev.get(&double_e).unwrap(), Value::Int(20));
    assert_eq!(DOUBLE_RUNS.with(Cell::get), 1);
}

#[test]
fn replayed_reads_leave_the_store_untouched() {
    let (registry, double_e) = double_registry();
    let mut ev = Evaluator::new(Store::new(), &registry);
    ev.set(&base(), Value::Int(10)).unwrap();

    ev.get(&double_e).unwrap();
    let snapshot = ev.store().clone();
    ev.get(&double_e).unwrap();

    assert_eq!(ev.store(), &snapshot);
}

#[test]
fn invalidation_triggers_recompute() {
    let (registry, double_e) = double_registry();
    let mut ev = Evaluator::new(Store::new(), &registry);

    ev.set(&base(), Value::Int(10)).unwrap();
    assert_eq!(ev.get(&double_e).unwrap(), Value::Int(20));

    ev.set(&base(), Value::Int(7)).unwrap();
    assert!(!ev.store().contains(&double_e));
    assert_eq!(ev.get(&double_e).unwrap(), Value::Int(14));
    assert_eq!(DOUBLE_RUNS.with(Cell::get), 2);
}

// =============================================================================
// Dependency Recording
// =============================================================================

#[test]
fn spy_records_the_edge_in_both_directions() {
    let (registry, double_e) = double_registry();
    let mut ev = Evaluator::new(Store::new(), &registry);
    ev.set(&base(), Value::Int(1)).unwrap();
    ev.get(&double_e).unwrap();

    let store = ev.store();
    assert!(store.contributors_of(&double_e).contains(&base()));
    assert!(store.dependents_of(&base()).contains(&double_e));
}

#[test]
fn top_level_spy_records_nothing() {
    let (registry, _) = double_registry();
    let mut ev = Evaluator::new(Store::new(), &registry);
    ev.set(&base(), Value::Int(1)).unwrap();

    // No computation in flight: there is no reader to attribute the edge to.
    ev.spy(&base()).unwrap();
    assert!(ev.store().dependents_of(&base()).is_empty());
}

// =============================================================================
// Failure Capture
// =============================================================================

#[test]
fn failures_replay_without_rerunning() {
    let mut registry = Registry::new();
    let id = registry.register("failing", failing).unwrap();
    let e = Expr::from(vec![Term::Fn(id)]);

    let mut ev = Evaluator::new(Store::new(), &registry);
    let first = ev.get(&e).unwrap_err();
    let second = ev.get(&e).unwrap_err();

    assert_eq!(first, second);
    assert_eq!(FAIL_RUNS.with(Cell::get), 1);
    assert!(ev.store().cached(&e).unwrap().is_thrown());
}

#[test]
fn failed_contributors_still_steer_invalidation() {
    fn brittle(ev: &mut Evaluator<'_>, _args: &[Term]) -> Result<Value> {
        let v = ev.spy(&base())?;
        if v.is_truthy() {
            Ok(v)
        } else {
            Err(Error::predicate("base is off"))
        }
    }

    let mut registry = Registry::new();
    let id = registry.register("brittle", brittle).unwrap();
    let e = Expr::from(vec![Term::Fn(id)]);

    let mut ev = Evaluator::new(Store::new(), &registry);
    ev.set(&base(), Value::Bool(false)).unwrap();
    ev.get(&e).unwrap_err();

    // The failed entry was recorded as a dependent of base, so fixing base
    // invalidates it and the next read succeeds.
    ev.set(&base(), Value::Bool(true)).unwrap();
    assert_eq!(ev.get(&e).unwrap(), Value::Bool(true));
}

// =============================================================================
// Registry Misuse
// =============================================================================

#[test]
fn effect_heads_are_not_evaluable() {
    fn effect(_args: &[Term]) -> futures::future::LocalBoxFuture<'static, Result<Value>> {
        use futures::FutureExt;
        async { Ok(Value::Nil) }.boxed_local()
    }

    let mut registry = Registry::new();
    let id = registry.register_effect("effect", effect).unwrap();
    let e = Expr::from(vec![Term::Fn(id)]);

    let mut ev = Evaluator::new(Store::new(), &registry);
    let err = ev.get(&e).unwrap_err();

    assert!(matches!(err.kind, ErrorKind::NotSynchronous(_)));
    // Misuse is not cached.
    assert!(!ev.store().contains(&e));
}

#[test]
fn unregistered_ids_error_without_caching() {
    let registry = Registry::new();
    let e = Expr::from(vec![Term::Fn(FnId::new(41))]);

    let mut ev = Evaluator::new(Store::new(), &registry);
    let err = ev.get(&e).unwrap_err();

    assert!(matches!(err.kind, ErrorKind::UnknownFunction(_)));
    assert!(!ev.store().contains(&e));
}
