//! Integration tests for result promises.

use std::cell::{Cell, RefCell};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::block_on;
use futures::future::LocalBoxFuture;

use lattice_engine::{Evaluator, Registry};
use lattice_foundation::{Error, Expr, FnId, Result, TagId, Term, Value};
use lattice_reactor::Reactor;

fn base() -> Expr {
    Expr::from(vec![Term::from("base")])
}

/// Spies the expression spliced into its arguments and wraps the value.
fn compose(ev: &mut Evaluator<'_>, args: &[Term]) -> Result<Value> {
    let inner = ev.spy(&Expr::from_terms(args.iter().cloned()))?;
    Ok(Value::from(format!("composed-{inner}")))
}

/// Spies two equally-sized spliced expressions and joins their values.
fn pair(ev: &mut Evaluator<'_>, args: &[Term]) -> Result<Value> {
    let mid = args.len() / 2;
    let a = ev.spy(&Expr::from_terms(args[..mid].iter().cloned()))?;
    let b = ev.spy(&Expr::from_terms(args[mid..].iter().cloned()))?;
    Ok(Value::from(format!("{a}+{b}")))
}

thread_local! {
    static QUICK_CALLS: Cell<usize> = const { Cell::new(0) };
    static GATE: RefCell<Option<oneshot::Sender<Value>>> = const { RefCell::new(None) };
}

fn quick(args: &[Term]) -> LocalBoxFuture<'static, Result<Value>> {
    QUICK_CALLS.with(|c| c.set(c.get() + 1));
    let tag = args
        .first()
        .and_then(Term::as_str)
        .unwrap_or_default()
        .to_string();
    async move { Ok(Value::from(format!("quick-{tag}"))) }.boxed_local()
}

/// Resolves only when the test fires the gate.
fn gated(_args: &[Term]) -> LocalBoxFuture<'static, Result<Value>> {
    let (tx, rx) = oneshot::channel();
    GATE.with(|g| *g.borrow_mut() = Some(tx));
    async move {
        match rx.await {
            Ok(value) => Ok(value),
            Err(oneshot::Canceled) => Err(Error::predicate("gate dropped")),
        }
    }
    .boxed_local()
}

// =============================================================================
// Synchronous Resolution
// =============================================================================

#[test]
fn ready_values_resolve_immediately() {
    let reactor = Reactor::new(Registry::new()).unwrap();
    reactor.set(base(), Value::Int(10)).unwrap();

    let value = block_on(reactor.result_promise(base())).unwrap();
    assert_eq!(value, Value::Int(10));
}

#[test]
fn cached_failures_reject_immediately() {
    fn failing(_ev: &mut Evaluator<'_>, _args: &[Term]) -> Result<Value> {
        Err(Error::predicate("broken"))
    }

    let mut registry = Registry::new();
    let id = registry.register("failing", failing).unwrap();
    let reactor = Reactor::new(registry).unwrap();

    let err = block_on(reactor.result_promise(Expr::from(vec![Term::Fn(id)]))).unwrap_err();
    assert_eq!(err, Error::predicate("broken"));
}

// =============================================================================
// Deferred Resolution
// =============================================================================

fn composed_over(reactor: &Reactor, compose_id: FnId, effect: FnId, arg: &str) -> Expr {
    let view = reactor
        .bridge()
        .effect_result_expr(effect, &[Term::from(arg)]);
    view.prepend(Term::Fn(compose_id))
}

#[test]
fn promises_resolve_when_the_effect_completes() {
    let mut registry = Registry::new();
    let compose_id = registry.register("compose", compose).unwrap();
    let effect = registry.register_effect("gated", gated).unwrap();
    let reactor = Reactor::new(registry).unwrap();

    let outer = composed_over(&reactor, compose_id, effect, "x");
    reactor.ensure_async_run(effect, &[Term::from("x")]).unwrap();
    let promise = reactor.result_promise(outer);

    // Not resolvable yet: the gate is still closed.
    reactor.run_until_stalled();
    assert_eq!(
        reactor
            .get(
                reactor
                    .bridge()
                    .status_probe_expr(effect, &[Term::from("x")])
            )
            .unwrap(),
        Value::Tag(TagId::EXECUTING)
    );

    GATE.with(|g| g.borrow_mut().take())
        .expect("gate armed")
        .send(Value::from("payload"))
        .unwrap();
    reactor.run_until_stalled();

    assert_eq!(block_on(promise).unwrap(), Value::from("composed-payload"));
}

#[test]
fn ensured_promises_start_the_work_themselves() {
    let mut registry = Registry::new();
    let compose_id = registry.register("compose", compose).unwrap();
    let effect = registry.register_effect("quick", quick).unwrap();
    let reactor = Reactor::new(registry).unwrap();

    let outer = composed_over(&reactor, compose_id, effect, "y");
    let promise = reactor.ensured_result_promise(outer);
    reactor.run_until_stalled();

    assert_eq!(
        block_on(promise).unwrap(),
        Value::from("composed-quick-y")
    );
    assert_eq!(QUICK_CALLS.with(Cell::get), 1);
}

#[test]
fn ensured_promises_chase_transitive_calls() {
    let mut registry = Registry::new();
    let pair_id = registry.register("pair", pair).unwrap();
    let effect = registry.register_effect("quick", quick).unwrap();
    let reactor = Reactor::new(registry).unwrap();

    // [pair <view-of a> <view-of b>]: the second call is only discoverable
    // after the first completes.
    let bridge = reactor.bridge();
    let view_a = bridge.effect_result_expr(effect, &[Term::from("a")]);
    let view_b = bridge.effect_result_expr(effect, &[Term::from("b")]);
    let outer = Expr::from_terms(
        std::iter::once(Term::Fn(pair_id))
            .chain(view_a.terms().cloned())
            .chain(view_b.terms().cloned()),
    );

    let promise = reactor.ensured_result_promise(outer);
    reactor.run_until_stalled();
    reactor.run_until_stalled();

    assert_eq!(
        block_on(promise).unwrap(),
        Value::from("quick-a+quick-b")
    );
    assert_eq!(QUICK_CALLS.with(Cell::get), 2);
}

#[test]
fn plain_promises_do_not_start_work() {
    let mut registry = Registry::new();
    let compose_id = registry.register("compose", compose).unwrap();
    let effect = registry.register_effect("quick", quick).unwrap();
    let reactor = Reactor::new(registry).unwrap();

    let outer = composed_over(&reactor, compose_id, effect, "z");
    let _promise = reactor.result_promise(outer);
    reactor.run_until_stalled();

    assert_eq!(QUICK_CALLS.with(Cell::get), 0);
}
