//! Integration tests for cascading writes.
//!
//! Cascading predicates here are registered first (and second, for the
//! nested case), so their bodies can rebuild their own expressions from
//! `FnId(0)` and `FnId(1)`; each test asserts that assumption.

use lattice_engine::{Evaluator, Registry};
use lattice_foundation::{Error, Expr, FnId, Result, Term, Value};
use lattice_store::Store;

fn child_expr(key: &Term) -> Expr {
    Expr::from(vec![Term::from("child"), key.clone()])
}

fn nil_body(_ev: &mut Evaluator<'_>, _args: &[Term]) -> Result<Value> {
    Ok(Value::Nil)
}

/// Writes `[child <value>] := <first argument>`.
fn parent_setter(ev: &mut Evaluator<'_>, expr: &Expr, value: &Value) -> Result<()> {
    let key = value
        .to_term()
        .ok_or_else(|| Error::predicate("expected a scalar write"))?;
    let stored = expr.get(1).and_then(Term::to_value).unwrap_or(Value::Nil);
    ev.set(&child_expr(&key), stored)
}

fn parent_registry() -> Registry {
    let mut registry = Registry::new();
    let id = registry
        .register_cascading("parent", nil_body, parent_setter)
        .unwrap();
    assert_eq!(id, FnId::new(0));
    registry
}

fn parent_expr(arg: &str) -> Expr {
    Expr::from(vec![Term::Fn(FnId::new(0)), Term::from(arg)])
}

// =============================================================================
// Basic Cascade
// =============================================================================

#[test]
fn setter_consequences_are_readable() {
    let registry = parent_registry();
    let mut ev = Evaluator::new(Store::new(), &registry);

    ev.set(&parent_expr("B"), Value::from("A")).unwrap();

    assert_eq!(ev.get(&parent_expr("B")).unwrap(), Value::from("A"));
    assert_eq!(
        ev.get(&child_expr(&Term::from("A"))).unwrap(),
        Value::from("B")
    );
}

#[test]
fn cascade_affected_set_includes_consequences() {
    let registry = parent_registry();
    let mut ev = Evaluator::new(Store::new(), &registry);

    ev.set(&parent_expr("B"), Value::from("A")).unwrap();
    let (_, affected) = ev.finish();

    assert!(affected.contains(&parent_expr("B")));
    assert!(affected.contains(&child_expr(&Term::from("A"))));
}

#[test]
fn consequences_invalidate_their_own_dependents() {
    let registry = parent_registry();

    // A reader cached against the child's previous value.
    let store = Store::new()
        .with_value(&Expr::from(vec![Term::from("reader")]), Value::Int(1))
        .with_edge(
            &Expr::from(vec![Term::from("reader")]),
            &child_expr(&Term::from("A")),
        );

    let mut ev = Evaluator::new(store, &registry);
    ev.set(&parent_expr("B"), Value::from("A")).unwrap();
    let (store, affected) = ev.finish();

    assert!(affected.contains(&Expr::from(vec![Term::from("reader")])));
    assert!(!store.contains(&Expr::from(vec![Term::from("reader")])));
}

#[test]
fn cascading_heads_still_evaluate_when_read() {
    let registry = parent_registry();
    let mut ev = Evaluator::new(Store::new(), &registry);

    // Never written: reading runs the predicate body like any other.
    assert_eq!(ev.get(&parent_expr("unwritten")).unwrap(), Value::Nil);
}

// =============================================================================
// Nested Cascades
// =============================================================================

/// Forwards the write into a second cascading predicate.
fn outer_setter(ev: &mut Evaluator<'_>, _expr: &Expr, value: &Value) -> Result<()> {
    let key = value
        .to_term()
        .ok_or_else(|| Error::predicate("expected a scalar write"))?;
    ev.set(
        &Expr::from(vec![Term::Fn(FnId::new(1)), key]),
        value.clone(),
    )
}

/// Writes the leaf consequence.
fn inner_setter(ev: &mut Evaluator<'_>, _expr: &Expr, value: &Value) -> Result<()> {
    let key = value
        .to_term()
        .ok_or_else(|| Error::predicate("expected a scalar write"))?;
    ev.set(&Expr::from(vec![Term::from("leaf"), key]), value.clone())
}

#[test]
fn nested_cascades_accumulate_into_one_affected_set() {
    let mut registry = Registry::new();
    let outer = registry
        .register_cascading("outer", nil_body, outer_setter)
        .unwrap();
    let inner = registry
        .register_cascading("inner", nil_body, inner_setter)
        .unwrap();
    assert_eq!((outer, inner), (FnId::new(0), FnId::new(1)));

    let mut ev = Evaluator::new(Store::new(), &registry);
    let top = Expr::from(vec![Term::Fn(outer), Term::from("k")]);
    ev.set(&top, Value::from("x")).unwrap();
    let (store, affected) = ev.finish();

    let mid = Expr::from(vec![Term::Fn(inner), Term::from("x")]);
    let leaf = Expr::from(vec![Term::from("leaf"), Term::from("x")]);
    assert!(affected.contains(&top));
    assert!(affected.contains(&mid));
    assert!(affected.contains(&leaf));
    assert_eq!(store.cached(&leaf).unwrap().to_result().unwrap(), Value::from("x"));
}

// =============================================================================
// Cascade Attribution
// =============================================================================

/// Publishes a derivative from inside the setter: the consequence must be
/// attributed to the cascading write expression.
fn noting_setter(ev: &mut Evaluator<'_>, _expr: &Expr, value: &Value) -> Result<()> {
    let id = ev.derivative_id(Term::from("note"))?;
    let note = Expr::from(vec![Term::from("note"), Term::from(id)]);
    ev.set_derivative(&note, value.clone())
}

#[test]
fn setter_derivatives_are_owned_by_the_write() {
    let mut registry = Registry::new();
    let id = registry
        .register_cascading("noting", nil_body, noting_setter)
        .unwrap();
    assert_eq!(id, FnId::new(0));

    let written = Expr::from(vec![Term::Fn(id), Term::from("k")]);
    let mut ev = Evaluator::new(Store::new(), &registry);
    ev.set(&written, Value::Int(5)).unwrap();

    let note_id = lattice_foundation::DerivativeId::new(written.clone(), Term::from("note"));
    let note = Expr::from(vec![Term::from("note"), Term::from(note_id)]);
    assert_eq!(ev.get(&note).unwrap(), Value::Int(5));
    assert!(ev.store().contributors_of(&note).contains(&written));

    // Rewriting the cascading expression invalidates the old note through
    // the ownership edge, then the re-run setter publishes the new one.
    ev.set(&written, Value::Int(6)).unwrap();
    assert_eq!(ev.get(&note).unwrap(), Value::Int(6));
}
