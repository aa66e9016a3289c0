//! Integration tests for recursion detection.
//!
//! The recursive predicates here reference themselves through the id the
//! registry hands out first, `FnId(0)`; each test asserts that assumption.

use lattice_engine::{Evaluator, Registry};
use lattice_foundation::{Expr, FnId, Result, Term, Value};
use lattice_foundation::ErrorKind;
use lattice_store::Store;

fn first_fn_expr() -> Expr {
    Expr::from(vec![Term::Fn(FnId::new(0))])
}

fn flag() -> Expr {
    Expr::from(vec![Term::from("use-recursion")])
}

fn self_spy(ev: &mut Evaluator<'_>, _args: &[Term]) -> Result<Value> {
    ev.spy(&first_fn_expr())
}

/// Spies itself only while the flag is truthy.
fn guarded(ev: &mut Evaluator<'_>, _args: &[Term]) -> Result<Value> {
    if ev.spy(&flag())?.is_truthy() {
        ev.spy(&first_fn_expr())
    } else {
        Ok(Value::Int(1))
    }
}

#[test]
fn self_spy_raises_recursive_computation() {
    let mut registry = Registry::new();
    let id = registry.register("self-spy", self_spy).unwrap();
    assert_eq!(id, FnId::new(0));

    let mut ev = Evaluator::new(Store::new(), &registry);
    let err = ev.get(&first_fn_expr()).unwrap_err();

    let ErrorKind::RecursiveComputation(expr) = &err.kind else {
        panic!("expected a recursion error, got {err}");
    };
    assert_eq!(expr, &first_fn_expr());
}

#[test]
fn recursion_leaves_no_trace_in_the_store() {
    let mut registry = Registry::new();
    registry.register("self-spy", self_spy).unwrap();

    let mut ev = Evaluator::new(Store::new(), &registry);
    ev.get(&first_fn_expr()).unwrap_err();

    let store = ev.store();
    assert!(!store.contains(&first_fn_expr()));
    assert!(store.contributors_of(&first_fn_expr()).is_empty());
    assert!(store.dependents_of(&first_fn_expr()).is_empty());
}

#[test]
fn recursion_is_not_cached_and_recovery_succeeds() {
    let mut registry = Registry::new();
    let id = registry.register("guarded", guarded).unwrap();
    assert_eq!(id, FnId::new(0));

    let mut ev = Evaluator::new(Store::new(), &registry);
    ev.set(&flag(), Value::Bool(true)).unwrap();

    // Raised on every attempt while the recursive path is live: nothing
    // was cached by the failure.
    ev.get(&first_fn_expr()).unwrap_err();
    ev.get(&first_fn_expr()).unwrap_err();
    assert!(!ev.store().contains(&first_fn_expr()));

    // Removing the recursive path makes the same expression compute.
    ev.set(&flag(), Value::Bool(false)).unwrap();
    assert_eq!(ev.get(&first_fn_expr()).unwrap(), Value::Int(1));
}

#[test]
fn mutual_recursion_is_detected() {
    fn ping(ev: &mut Evaluator<'_>, _args: &[Term]) -> Result<Value> {
        ev.spy(&Expr::from(vec![Term::Fn(FnId::new(1))]))
    }
    fn pong(ev: &mut Evaluator<'_>, _args: &[Term]) -> Result<Value> {
        ev.spy(&Expr::from(vec![Term::Fn(FnId::new(0))]))
    }

    let mut registry = Registry::new();
    let ping_id = registry.register("ping", ping).unwrap();
    let pong_id = registry.register("pong", pong).unwrap();
    assert_eq!((ping_id, pong_id), (FnId::new(0), FnId::new(1)));

    let mut ev = Evaluator::new(Store::new(), &registry);
    let err = ev.get(&Expr::from(vec![Term::Fn(ping_id)])).unwrap_err();

    let ErrorKind::RecursiveComputation(expr) = &err.kind else {
        panic!("expected a recursion error, got {err}");
    };
    assert_eq!(expr, &Expr::from(vec![Term::Fn(ping_id)]));

    // Neither half of the cycle got cached.
    assert!(!ev.store().contains(&Expr::from(vec![Term::Fn(ping_id)])));
    assert!(!ev.store().contains(&Expr::from(vec![Term::Fn(pong_id)])));
}
